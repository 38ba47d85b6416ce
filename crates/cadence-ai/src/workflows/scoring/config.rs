use serde::{Deserialize, Serialize};

/// Weights fusing the four component scores into the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub predictive: f64,
    pub intent: f64,
    pub icp_fit: f64,
    pub verification: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            predictive: 0.45,
            intent: 0.25,
            icp_fit: 0.20,
            verification: 0.10,
        }
    }
}

/// One row of the ICP fit table: additive delta when the rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub delta: i32,
}

/// Company-size band with an additive delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBand {
    pub min: u32,
    pub max: u32,
    pub delta: i32,
}

/// Ideal-customer-profile rule table. This is configuration, not code: hosts
/// tune it per vertical without touching the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcpRuleTable {
    /// Score assigned when no enrichment snapshot exists (neutral prior).
    pub missing_snapshot_score: u8,
    pub base: i32,
    pub industries: Vec<KeywordRule>,
    pub size_bands: Vec<SizeBand>,
    pub seniority: Vec<KeywordRule>,
    pub tech_delta_per_match: i32,
    pub tech_delta_cap: i32,
    pub competitor_delta: i32,
}

impl Default for IcpRuleTable {
    fn default() -> Self {
        Self {
            missing_snapshot_score: 40,
            base: 40,
            industries: vec![
                KeywordRule {
                    keyword: "network marketing".to_string(),
                    delta: 20,
                },
                KeywordRule {
                    keyword: "direct sales".to_string(),
                    delta: 20,
                },
                KeywordRule {
                    keyword: "real estate".to_string(),
                    delta: 15,
                },
                KeywordRule {
                    keyword: "finance".to_string(),
                    delta: 10,
                },
                KeywordRule {
                    keyword: "coaching".to_string(),
                    delta: 10,
                },
            ],
            size_bands: vec![
                SizeBand {
                    min: 1,
                    max: 10,
                    delta: 10,
                },
                SizeBand {
                    min: 11,
                    max: 50,
                    delta: 5,
                },
                SizeBand {
                    min: 51,
                    max: u32::MAX,
                    delta: -5,
                },
            ],
            seniority: vec![
                KeywordRule {
                    keyword: "founder".to_string(),
                    delta: 10,
                },
                KeywordRule {
                    keyword: "owner".to_string(),
                    delta: 10,
                },
                KeywordRule {
                    keyword: "director".to_string(),
                    delta: 8,
                },
                KeywordRule {
                    keyword: "head".to_string(),
                    delta: 8,
                },
                KeywordRule {
                    keyword: "assistant".to_string(),
                    delta: -5,
                },
            ],
            tech_delta_per_match: 5,
            tech_delta_cap: 10,
            competitor_delta: 10,
        }
    }
}

/// Bounded deltas applied per verification sub-check, around a neutral 50.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationDeltas {
    pub baseline: i32,
    pub email_syntax_ok: i32,
    pub email_syntax_bad: i32,
    pub domain_ok: i32,
    pub domain_bad: i32,
    pub smtp_ok: i32,
    pub smtp_bad: i32,
    pub disposable_domain: i32,
    pub phone_ok: i32,
    pub phone_bad: i32,
    pub social_found: i32,
    pub bot_penalty_max: i32,
}

impl Default for VerificationDeltas {
    fn default() -> Self {
        Self {
            baseline: 50,
            email_syntax_ok: 10,
            email_syntax_bad: -20,
            domain_ok: 10,
            domain_bad: -15,
            smtp_ok: 10,
            smtp_bad: -10,
            disposable_domain: -30,
            phone_ok: 10,
            phone_bad: -10,
            social_found: 10,
            bot_penalty_max: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Event lookback, in days.
    pub window_days: u32,
    pub weights: CompositeWeights,
    pub icp: IcpRuleTable,
    pub verification: VerificationDeltas,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            weights: CompositeWeights::default(),
            icp: IcpRuleTable::default(),
            verification: VerificationDeltas::default(),
        }
    }
}
