//! Inspection discipline classification by keyword rules

/// Discipline used when no rule matches
pub const GENERAL_SYSTEM: &str = "general";

/// One keyword rule; any keyword matching selects the system
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    /// System id assigned on match
    pub system_id: String,
    /// Lowercase substrings searched in title and code
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    /// Build a rule from string literals
    pub fn new(system_id: &str, keywords: &[&str]) -> Self {
        Self {
            system_id: system_id.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// Ordered rule list; the first matching rule wins
#[derive(Debug, Clone, PartialEq)]
pub struct SystemClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for SystemClassifier {
    fn default() -> Self {
        Self::with_rules(vec![
            ClassificationRule::new("smoke_control", &["smoke control", "smoke exhaust", "противодым", "дымоудал"]),
            ClassificationRule::new("fire_alarm", &["fire alarm", "fire detection", "alarm system", "сигнализац"]),
            ClassificationRule::new("fire_suppression", &["sprinkler", "suppression", "extinguishing", "пожаротуш"]),
            ClassificationRule::new("emergency_lighting", &["emergency lighting", "аварийное освещ", "эвакуационное освещ"]),
            ClassificationRule::new("evacuation", &["evacuation", "escape route", "эвакуац"]),
            ClassificationRule::new("fire_water_supply", &["water supply", "hydrant", "водоснабж", "гидрант"]),
            ClassificationRule::new("fire_resistance", &["fire resistance", "fire-resistance", "огнестойк", "огнезащит"]),
        ])
    }
}

impl SystemClassifier {
    /// Classifier with a custom ordered rule list
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Classify a document by its title and code
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_converter::SystemClassifier;
    ///
    /// let classifier = SystemClassifier::default();
    /// assert_eq!(classifier.classify("Automatic sprinkler systems", "NFPA 13"), "fire_suppression");
    /// assert_eq!(classifier.classify("Building permits", "LAW 1"), "general");
    /// ```
    pub fn classify(&self, title: &str, code: &str) -> &str {
        let haystack = format!("{} {}", title, code).to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&haystack))
            .map(|rule| rule.system_id.as_str())
            .unwrap_or(GENERAL_SYSTEM)
    }
}
