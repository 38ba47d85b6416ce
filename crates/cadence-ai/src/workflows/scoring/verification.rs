use crate::workflows::leads::events::VerificationReport;

use super::config::VerificationDeltas;
use super::rules::clamp_score;

fn delta(flag: Option<bool>, ok: i32, bad: i32) -> i32 {
    match flag {
        Some(true) => ok,
        Some(false) => bad,
        None => 0,
    }
}

/// Verification component from the most recent verification report.
/// No report at all leaves the lead at the neutral baseline.
pub(crate) fn verification(report: Option<&VerificationReport>, deltas: &VerificationDeltas) -> u8 {
    let Some(report) = report else {
        return clamp_score(deltas.baseline as f64);
    };

    let mut score = deltas.baseline;
    score += delta(
        report.email_syntax_valid,
        deltas.email_syntax_ok,
        deltas.email_syntax_bad,
    );
    score += delta(
        report.email_domain_resolves,
        deltas.domain_ok,
        deltas.domain_bad,
    );
    score += delta(report.smtp_reachable, deltas.smtp_ok, deltas.smtp_bad);
    // Disposable inboxes are the strongest negative signal we have.
    if report.disposable_domain == Some(true) {
        score += deltas.disposable_domain;
    }
    score += delta(
        report.phone_format_valid,
        deltas.phone_ok,
        deltas.phone_bad,
    );
    if report.social_profile_found == Some(true) {
        score += deltas.social_found;
    }
    if let Some(likelihood) = report.bot_likelihood {
        let clamped = likelihood.clamp(0.0, 1.0) as f64;
        score -= (deltas.bot_penalty_max as f64 * clamped).round() as i32;
    }

    clamp_score(score as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_report_is_neutral() {
        assert_eq!(verification(None, &VerificationDeltas::default()), 50);
    }

    #[test]
    fn valid_email_only_moves_to_sixty() {
        let report = VerificationReport {
            email_syntax_valid: Some(true),
            ..VerificationReport::default()
        };
        assert_eq!(verification(Some(&report), &VerificationDeltas::default()), 60);
    }

    #[test]
    fn disposable_domain_and_bots_are_punished() {
        let report = VerificationReport {
            email_syntax_valid: Some(true),
            disposable_domain: Some(true),
            bot_likelihood: Some(1.0),
            ..VerificationReport::default()
        };
        // 50 + 10 - 30 - 25
        assert_eq!(verification(Some(&report), &VerificationDeltas::default()), 5);
    }

    #[test]
    fn fully_verified_report_reaches_the_ceiling() {
        let strong = VerificationReport {
            email_syntax_valid: Some(true),
            email_domain_resolves: Some(true),
            smtp_reachable: Some(true),
            disposable_domain: Some(false),
            phone_format_valid: Some(true),
            social_profile_found: Some(true),
            bot_likelihood: Some(0.0),
        };
        // 50 + 10 + 10 + 10 + 0 + 10 + 10 = 100, clamped
        assert_eq!(
            verification(Some(&strong), &VerificationDeltas::default()),
            100
        );
    }
}
