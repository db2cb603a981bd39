//! Decision policy: a pure mapping from verdict to act/skip.

use crate::pipeline::types::{Decision, SkipReason, Verdict};

/// Decide whether to act on a verdict.
///
/// Acts only on an opportunity category with `should_act` set and a
/// non-blank action URL. A positive verdict without a URL is skipped with
/// its own reason so the log can tell the two cases apart.
pub fn decide(verdict: &Verdict) -> Decision {
    let category = verdict.category;

    if !verdict.should_act || !category.is_opportunity() {
        return Decision::Skip {
            category,
            reason: SkipReason::NotAnOpportunity,
        };
    }

    if verdict.action_url.trim().is_empty() {
        return Decision::Skip {
            category,
            reason: SkipReason::MissingActionUrl,
        };
    }

    Decision::Act { category }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Category;

    fn verdict(category: Category, should_act: bool, url: &str) -> Verdict {
        Verdict {
            category,
            should_act,
            action_url: url.into(),
            details: String::new(),
        }
    }

    #[test]
    fn acts_on_scholarship_with_url() {
        let d = decide(&verdict(Category::Scholarship, true, "https://x/apply"));
        assert_eq!(
            d,
            Decision::Act {
                category: Category::Scholarship
            }
        );
    }

    #[test]
    fn acts_on_job_with_url() {
        assert!(matches!(
            decide(&verdict(Category::Job, true, "https://techcorp.com/apply")),
            Decision::Act {
                category: Category::Job
            }
        ));
    }

    #[test]
    fn skips_when_should_act_false() {
        let d = decide(&verdict(Category::Job, false, "https://x/apply"));
        assert_eq!(
            d,
            Decision::Skip {
                category: Category::Job,
                reason: SkipReason::NotAnOpportunity
            }
        );
    }

    #[test]
    fn skips_empty_url_with_distinct_reason() {
        for url in ["", "   "] {
            let d = decide(&verdict(Category::Scholarship, true, url));
            assert_eq!(
                d,
                Decision::Skip {
                    category: Category::Scholarship,
                    reason: SkipReason::MissingActionUrl
                }
            );
        }
    }

    #[test]
    fn never_acts_on_other() {
        let d = decide(&verdict(Category::Other, true, "https://x/apply"));
        assert_eq!(
            d,
            Decision::Skip {
                category: Category::Other,
                reason: SkipReason::NotAnOpportunity
            }
        );
    }

    #[test]
    fn decision_is_referentially_transparent() {
        let v = verdict(Category::Job, true, "https://x/apply");
        assert_eq!(decide(&v), decide(&v));
    }
}
