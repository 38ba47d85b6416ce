use crate::workflows::leads::domain::EnrichmentSnapshot;

use super::config::IcpRuleTable;
use super::rules::clamp_score;

/// ICP fit from the enrichment snapshot. Missing enrichment yields the
/// configured neutral prior.
pub(crate) fn icp_fit(snapshot: Option<&EnrichmentSnapshot>, table: &IcpRuleTable) -> u8 {
    let Some(snapshot) = snapshot else {
        return table.missing_snapshot_score;
    };

    let mut score = table.base;

    if let Some(industry) = snapshot.industry.as_deref() {
        let industry = industry.to_lowercase();
        if let Some(rule) = table
            .industries
            .iter()
            .find(|rule| industry.contains(&rule.keyword))
        {
            score += rule.delta;
        }
    }

    if let Some(size) = snapshot.company_size {
        if let Some(band) = table
            .size_bands
            .iter()
            .find(|band| size >= band.min && size <= band.max)
        {
            score += band.delta;
        }
    }

    if let Some(title) = snapshot.role_title.as_deref() {
        let title = title.to_lowercase();
        if let Some(rule) = table
            .seniority
            .iter()
            .find(|rule| title.contains(&rule.keyword))
        {
            score += rule.delta;
        }
    }

    let tech_matches = snapshot.tech_keywords.len() as i32;
    score += (tech_matches * table.tech_delta_per_match).min(table.tech_delta_cap);

    if !snapshot.competitor_keywords.is_empty() {
        score += table.competitor_delta;
    }

    clamp_score(score as f64)
}
