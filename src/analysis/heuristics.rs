//! Lexical code heuristics
//!
//! Everything here is pattern counting over OCR output. The scores are rough
//! signals for the assistant UI, not static analysis.

use regex::Regex;

use super::{BestPractices, CodeComplexity, Language};
use crate::config::HeuristicConfig;

/// Heuristic results for one piece of recognized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicReport {
    /// Matching languages, in detection order
    pub languages: Vec<Language>,
    pub code_complexity: CodeComplexity,
    pub potential_issues: u32,
    /// Lexical performance score before blending with model confidence
    pub performance_score: u32,
    pub best_practices: BestPractices,
}

/// Compiled patterns plus the weights to apply to their counts
pub struct HeuristicAnalyzer {
    config: HeuristicConfig,
    signatures: Vec<(Language, Regex)>,
    loops: Regex,
    conditions: Regex,
    functions: Regex,
    issue_markers: Vec<Regex>,
    long_function: Regex,
    nested_control: Regex,
    const_declaration: Regex,
    loose_type: Regex,
    debug_print: Regex,
    numeric_literal: Regex,
}

fn signature(language: Language) -> &'static str {
    match language {
        Language::TypeScript => r"(?i)interface|type|extends|implements",
        Language::JavaScript => r"(?i)const|let|function|=>",
        Language::Python => r"(?i)def|class|import|from",
        Language::Java => r"(?i)public|private|class|void",
        Language::Cpp => r"(?i)#include|std::|cout",
    }
}

impl HeuristicAnalyzer {
    pub fn new(config: &HeuristicConfig) -> Result<Self, regex::Error> {
        let signatures = Language::ALL
            .iter()
            .map(|&lang| Regex::new(signature(lang)).map(|re| (lang, re)))
            .collect::<Result<Vec<_>, _>>()?;

        let issue_markers = [
            r"console\.(?:log|error|warn)",
            r"TODO",
            r"FIXME",
            r"any",
            r"\[\s*\]",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: config.clone(),
            signatures,
            loops: Regex::new(r"for|while|do")?,
            conditions: Regex::new(r"if|else|switch|case")?,
            functions: Regex::new(r"function|=>")?,
            issue_markers,
            long_function: Regex::new(&format!(
                r"function.*?\{{(?s:.){{{},}}\}}",
                config.long_function_min_body
            ))?,
            nested_control: Regex::new(r"for.*?for|if.*?if")?,
            const_declaration: Regex::new(r"const\s+[A-Za-z0-9_]+\s*=")?,
            loose_type: Regex::new(r":\s*any")?,
            debug_print: Regex::new(r"console\.")?,
            numeric_literal: Regex::new(r"[0-9]+")?,
        })
    }

    /// Run every heuristic over `text`
    pub fn analyze(&self, text: &str) -> HeuristicReport {
        let issues = self.count_issues(text);
        HeuristicReport {
            languages: self.detect_languages(text),
            code_complexity: self.classify_complexity(text),
            potential_issues: issues,
            performance_score: self.performance_score(text),
            best_practices: BestPractices {
                score: self.best_practices_score(text),
                issues,
            },
        }
    }

    /// Every language whose signature matches at least once
    pub fn detect_languages(&self, text: &str) -> Vec<Language> {
        self.signatures
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(lang, _)| *lang)
            .collect()
    }

    /// Loop + conditional + function markers against the two thresholds
    pub fn classify_complexity(&self, text: &str) -> CodeComplexity {
        let total =
            count(&self.loops, text) + count(&self.conditions, text) + count(&self.functions, text);

        if total > u64::from(self.config.high_threshold) {
            CodeComplexity::High
        } else if total > u64::from(self.config.medium_threshold) {
            CodeComplexity::Medium
        } else {
            CodeComplexity::Low
        }
    }

    /// Occurrences of debug prints, TODO/FIXME, `any` and empty arrays
    pub fn count_issues(&self, text: &str) -> u32 {
        let total: u64 = self.issue_markers.iter().map(|re| count(re, text)).sum();
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    pub fn performance_score(&self, text: &str) -> u32 {
        let c = &self.config;
        let deduction = weighted(count(&self.long_function, text), c.long_function_penalty)
            + weighted(count(&self.nested_control, text), c.nested_control_penalty)
            + weighted(count(&self.const_declaration, text), c.declaration_penalty);
        score_from(deduction)
    }

    pub fn best_practices_score(&self, text: &str) -> u32 {
        let c = &self.config;
        let deduction = weighted(count(&self.loose_type, text), c.loose_type_penalty)
            + weighted(count(&self.debug_print, text), c.debug_print_penalty)
            + weighted(count(&self.numeric_literal, text), c.numeric_literal_penalty);
        score_from(deduction)
    }
}

fn count(re: &Regex, text: &str) -> u64 {
    re.find_iter(text).count() as u64
}

fn weighted(occurrences: u64, weight: u32) -> u64 {
    occurrences.saturating_mul(u64::from(weight))
}

/// 100 minus the deduction, clamped to [0, 100]
fn score_from(deduction: u64) -> u32 {
    100u64.saturating_sub(deduction).min(100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> HeuristicAnalyzer {
        HeuristicAnalyzer::new(&HeuristicConfig::default()).unwrap()
    }

    #[test]
    fn test_typescript_interface_with_any() {
        let report = analyzer().analyze("interface Foo { bar: any }");

        assert!(report.languages.contains(&Language::TypeScript));
        assert!(report.best_practices.issues >= 1);
        // One `: any` annotation
        assert_eq!(report.best_practices.score, 95);
    }

    #[test]
    fn test_languages_in_detection_order() {
        let text = "#include <iostream>\ndef main():\n    import os";
        let languages = analyzer().detect_languages(text);
        assert_eq!(languages, vec![Language::Python, Language::Cpp]);

        // Signatures are case-insensitive and not exclusive
        let languages = analyzer().detect_languages("PUBLIC CLASS Main");
        assert_eq!(languages, vec![Language::Python, Language::Java]);

        assert!(analyzer().detect_languages("hello world").is_empty());
    }

    #[test]
    fn test_complexity_thresholds() {
        let a = analyzer();
        assert_eq!(a.classify_complexity("plain prose"), CodeComplexity::Low);
        assert_eq!(a.classify_complexity(&"if ".repeat(10)), CodeComplexity::Low);
        assert_eq!(a.classify_complexity(&"if ".repeat(11)), CodeComplexity::Medium);
        assert_eq!(a.classify_complexity(&"if ".repeat(20)), CodeComplexity::Medium);
        assert_eq!(a.classify_complexity(&"if ".repeat(21)), CodeComplexity::High);
    }

    #[test]
    fn test_mixed_markers_are_high() {
        let text = format!(
            "{}{}{}",
            "if (x) {}\n".repeat(9),
            "for (;;) {}\n".repeat(8),
            "function f() {}\n".repeat(8)
        );
        assert_eq!(analyzer().classify_complexity(&text), CodeComplexity::High);
    }

    #[test]
    fn test_issue_markers() {
        let text = "console.log(a); console.warn(b);\n// TODO fix\n// FIXME\nlet x: any = [];";
        // 2 console + TODO + FIXME + any + []
        assert_eq!(analyzer().count_issues(text), 6);
        assert_eq!(analyzer().count_issues(""), 0);
    }

    #[test]
    fn test_performance_penalties() {
        let a = analyzer();
        assert_eq!(a.performance_score("nothing to see"), 100);
        // Two const declarations
        assert_eq!(a.performance_score("const a = 1;\nconst b = 2;"), 98);
        // Nested loop on one line
        assert_eq!(a.performance_score("for (a of b) for (c of d) {}"), 97);

        let long = format!("function big() {{\n{}\n}}", "x".repeat(600));
        assert_eq!(a.performance_score(&long), 95);

        let short = format!("function small() {{\n{}\n}}", "x".repeat(100));
        assert_eq!(a.performance_score(&short), 100);
    }

    #[test]
    fn test_best_practices_penalties() {
        let a = analyzer();
        // console. x1 (2), digits "1" and "2" (2)
        assert_eq!(a.best_practices_score("console.log(1, 2)"), 96);
        assert_eq!(a.best_practices_score("clean"), 100);
    }

    #[test]
    fn test_scores_clamp_on_pathological_input() {
        let a = analyzer();
        let text = format!(
            "{}{}",
            "const v = 1; for for if if console.log(x: any)\n".repeat(200),
            "0 ".repeat(500)
        );
        let report = a.analyze(&text);
        assert_eq!(report.performance_score, 0);
        assert_eq!(report.best_practices.score, 0);
        assert!(report.performance_score <= 100);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let a = analyzer();
        let text = "const add = (a: any, b) => a + b; // TODO\nif (x) { console.error(1) }";
        assert_eq!(a.analyze(text), a.analyze(text));
    }

    #[test]
    fn test_custom_thresholds() {
        let config = HeuristicConfig {
            medium_threshold: 1,
            high_threshold: 2,
            ..Default::default()
        };
        let a = HeuristicAnalyzer::new(&config).unwrap();
        assert_eq!(a.classify_complexity("if"), CodeComplexity::Low);
        assert_eq!(a.classify_complexity("if if"), CodeComplexity::Medium);
        assert_eq!(a.classify_complexity("if if if"), CodeComplexity::High);
    }
}
