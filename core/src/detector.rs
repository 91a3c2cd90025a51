use ime_watcher_shared_types::LanguageSample;

/// Two-slot window over the language samples seen so far.
///
/// `is_changed` compares only the last two samples, so a caller that calls
/// `update` and then `is_changed` once per raw event sees each transition
/// exactly once without keeping a separate "already reported" flag.
#[derive(Debug, Clone)]
pub struct LanguageChangeDetector {
    base: LanguageSample,
    previous: Option<LanguageSample>,
    latest: Option<LanguageSample>,
}

impl LanguageChangeDetector {
    pub fn new() -> Self {
        Self::with_base(LanguageSample::BASE)
    }

    /// `base` is what `current` reports before the first `update`.
    pub fn with_base(base: LanguageSample) -> Self {
        Self {
            base,
            previous: None,
            latest: None,
        }
    }

    pub fn update(&mut self, sample: LanguageSample) {
        self.previous = self.latest.replace(sample);
    }

    pub fn is_changed(&self) -> bool {
        match (self.previous, self.latest) {
            (Some(previous), Some(latest)) => previous != latest,
            _ => false,
        }
    }

    pub fn current(&self) -> LanguageSample {
        self.latest.unwrap_or(self.base)
    }
}

impl Default for LanguageChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EN: LanguageSample = LanguageSample::BASE;

    fn ko() -> LanguageSample {
        LanguageSample::from_lang_id(0x0412)
    }

    fn ja() -> LanguageSample {
        LanguageSample::from_lang_id(0x0411)
    }

    #[test]
    fn test_first_sample_is_not_a_change() {
        let mut detector = LanguageChangeDetector::new();
        detector.update(ko());

        assert!(!detector.is_changed());
        assert_eq!(detector.current(), ko());
    }

    #[test]
    fn test_repeated_sample_is_not_a_change() {
        let mut detector = LanguageChangeDetector::new();
        detector.update(ko());
        detector.update(ko());

        assert!(!detector.is_changed());
    }

    #[test]
    fn test_distinct_samples_are_a_change() {
        let mut detector = LanguageChangeDetector::new();
        detector.update(EN);
        detector.update(ko());

        assert!(detector.is_changed());
        assert_eq!(detector.current(), ko());
    }

    #[test]
    fn test_only_last_two_samples_matter() {
        let mut detector = LanguageChangeDetector::new();
        detector.update(EN);
        detector.update(ko());
        detector.update(ja());
        assert!(detector.is_changed());

        let mut detector = LanguageChangeDetector::new();
        detector.update(EN);
        detector.update(ko());
        detector.update(ko());
        assert!(!detector.is_changed());

        // A -> B -> A reports both transitions.
        let mut detector = LanguageChangeDetector::new();
        detector.update(EN);
        detector.update(ko());
        detector.update(EN);
        assert!(detector.is_changed());
        assert_eq!(detector.current(), EN);
    }

    #[test]
    fn test_current_defaults_to_base() {
        assert_eq!(LanguageChangeDetector::new().current(), EN);
        assert!(!LanguageChangeDetector::default().is_changed());

        let detector = LanguageChangeDetector::with_base(ko());
        assert_eq!(detector.current(), ko());
    }

    #[test]
    fn test_queries_are_idempotent() {
        let mut detector = LanguageChangeDetector::new();
        detector.update(EN);
        detector.update(ko());

        for _ in 0..3 {
            assert!(detector.is_changed());
            assert_eq!(detector.current(), ko());
        }
    }

    #[test]
    fn test_en_ko_scenario() {
        let samples = [EN, EN, ko(), ko(), EN];
        let mut detector = LanguageChangeDetector::new();
        let mut changes = Vec::new();
        let mut currents = Vec::new();

        for sample in samples {
            detector.update(sample);
            changes.push(detector.is_changed());
            currents.push(detector.current());
        }

        assert_eq!(changes, vec![false, false, true, false, true]);
        assert_eq!(currents, samples.to_vec());
    }
}
