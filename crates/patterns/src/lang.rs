//! Per-language detector pattern packs (spec.md §4.3).
//!
//! Built-ins are embedded as YAML fixtures (`include_str!`) so the
//! registry never depends on a runtime filesystem layout. This is a
//! spec-driven choice, not a teacher pattern — no example repo in the
//! pack bundles fixtures this way.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use trace_governance_common::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LanguagePackRaw {
    pub language: String,
    #[serde(default)]
    pub corrections: Vec<String>,
    #[serde(default)]
    pub short_negatives: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub dissatisfaction: Vec<String>,
    #[serde(default)]
    pub satisfaction_overrides: Vec<String>,
    #[serde(default)]
    pub resolution_indicators: Vec<String>,
    #[serde(default)]
    pub completion_claims: Vec<String>,
    #[serde(default)]
    pub system_state_claims: Vec<String>,
    #[serde(default)]
    pub opinion_exclusions: Vec<String>,
}

/// Languages whose scripts have no whitespace word separation; `\b`
/// assertions are meaningless (and often wrong) against them.
const CJK_LANGUAGES: &[&str] = &["zh", "ja", "ko"];

pub struct CompiledLanguagePack {
    pub language: String,
    pub corrections: Vec<Regex>,
    pub short_negatives: Vec<Regex>,
    pub questions: Vec<Regex>,
    pub dissatisfaction: Vec<Regex>,
    pub satisfaction_overrides: Vec<Regex>,
    pub resolution_indicators: Vec<Regex>,
    pub completion_claims: Vec<Regex>,
    pub system_state_claims: Vec<Regex>,
    pub opinion_exclusions: Vec<Regex>,
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| AppError::Validation(format!("bad pattern `{p}`: {e}"))))
        .collect()
}

impl CompiledLanguagePack {
    pub fn compile(raw: LanguagePackRaw) -> Result<Self> {
        if CJK_LANGUAGES.contains(&raw.language.as_str()) {
            for pattern in raw
                .corrections
                .iter()
                .chain(&raw.short_negatives)
                .chain(&raw.dissatisfaction)
                .chain(&raw.completion_claims)
                .chain(&raw.system_state_claims)
            {
                if pattern.contains(r"\b") {
                    return Err(AppError::Validation(format!(
                        "CJK pack `{}` must not use word-boundary assertions: `{}`",
                        raw.language, pattern
                    )));
                }
            }
        }

        if raw.corrections.len() < 3 {
            return Err(AppError::Validation(format!(
                "pack `{}` needs >=3 correction indicators, has {}",
                raw.language,
                raw.corrections.len()
            )));
        }
        if raw.completion_claims.len() < 3 {
            return Err(AppError::Validation(format!(
                "pack `{}` needs >=3 completion claims, has {}",
                raw.language,
                raw.completion_claims.len()
            )));
        }
        if raw.system_state_claims.len() < 2 {
            return Err(AppError::Validation(format!(
                "pack `{}` needs >=2 system-state claims, has {}",
                raw.language,
                raw.system_state_claims.len()
            )));
        }

        Ok(Self {
            language: raw.language,
            corrections: compile_all(&raw.corrections)?,
            short_negatives: compile_all(&raw.short_negatives)?,
            questions: compile_all(&raw.questions)?,
            dissatisfaction: compile_all(&raw.dissatisfaction)?,
            satisfaction_overrides: compile_all(&raw.satisfaction_overrides)?,
            resolution_indicators: compile_all(&raw.resolution_indicators)?,
            completion_claims: compile_all(&raw.completion_claims)?,
            system_state_claims: compile_all(&raw.system_state_claims)?,
            opinion_exclusions: compile_all(&raw.opinion_exclusions)?,
        })
    }
}

/// Unconditionally merged on top of every language: a bare question mark
/// and the handful of emoji that carry dissatisfaction/satisfaction
/// signal regardless of the text's language.
pub static UNIVERSAL_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?").unwrap());
pub static UNIVERSAL_NEGATIVE_EMOJI: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{1F620}-\u{1F62F}\u{1F644}\u{1F614}]").unwrap());
pub static UNIVERSAL_POSITIVE_EMOJI: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{1F600}-\u{1F60F}\u{1F44D}]").unwrap());

/// Flattened view across every loaded pack, rebuilt on load/register and
/// cached until the next mutation.
pub struct MergedPatternSet {
    pub corrections: Vec<Regex>,
    pub short_negatives: Vec<Regex>,
    pub questions: Vec<Regex>,
    pub dissatisfaction: Vec<Regex>,
    pub satisfaction_overrides: Vec<Regex>,
    pub resolution_indicators: Vec<Regex>,
    pub completion_claims: Vec<Regex>,
    pub system_state_claims: Vec<Regex>,
    pub opinion_exclusions: Vec<Regex>,
}

impl MergedPatternSet {
    pub fn is_question(&self, text: &str) -> bool {
        UNIVERSAL_QUESTION.is_match(text) || self.questions.iter().any(|r| r.is_match(text))
    }

    pub fn matches_any(patterns: &[Regex], text: &str) -> bool {
        patterns.iter().any(|r| r.is_match(text))
    }
}

fn merge(packs: &[Arc<CompiledLanguagePack>]) -> MergedPatternSet {
    macro_rules! flatten {
        ($field:ident) => {
            packs
                .iter()
                .flat_map(|p| p.$field.iter().map(|r| r.clone()))
                .collect()
        };
    }
    MergedPatternSet {
        corrections: flatten!(corrections),
        short_negatives: flatten!(short_negatives),
        questions: flatten!(questions),
        dissatisfaction: flatten!(dissatisfaction),
        satisfaction_overrides: flatten!(satisfaction_overrides),
        resolution_indicators: flatten!(resolution_indicators),
        completion_claims: flatten!(completion_claims),
        system_state_claims: flatten!(system_state_claims),
        opinion_exclusions: flatten!(opinion_exclusions),
    }
}

/// Registry of loaded language packs plus the cached merged view.
///
/// Packs are immutable once loaded; `register` replaces an existing pack
/// by language code under a write lock and invalidates the cache — the
/// copy-on-write scheme spec.md §9 calls for.
pub struct LanguageRegistry {
    packs: RwLock<HashMap<String, Arc<CompiledLanguagePack>>>,
    merged_cache: RwLock<Option<Arc<MergedPatternSet>>>,
}

macro_rules! builtin_yaml {
    ($lang:literal) => {
        include_str!(concat!("packs/", $lang, ".yaml"))
    };
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self {
            packs: RwLock::new(HashMap::new()),
            merged_cache: RwLock::new(None),
        }
    }

    /// Loads the synchronous built-in subset: `en`, `de`. Called during
    /// startup before any async loaders have had a chance to run.
    pub fn load_builtin_sync(&self) -> Result<()> {
        for yaml in [builtin_yaml!("en"), builtin_yaml!("de")] {
            self.load_yaml(yaml)?;
        }
        Ok(())
    }

    /// Loads the remaining built-ins (`fr`, `es`, `pt`, `it`, `zh`, `ja`,
    /// `ko`, `ru`). Modeled as `async` because in the original system this
    /// step does non-trivial I/O; the fixtures here are embedded, so the
    /// only suspension point is the yield itself.
    pub async fn load_builtin_async(&self) -> Result<()> {
        for yaml in [
            builtin_yaml!("fr"),
            builtin_yaml!("es"),
            builtin_yaml!("pt"),
            builtin_yaml!("it"),
            builtin_yaml!("zh"),
            builtin_yaml!("ja"),
            builtin_yaml!("ko"),
            builtin_yaml!("ru"),
        ] {
            tokio::task::yield_now().await;
            self.load_yaml(yaml)?;
        }
        Ok(())
    }

    fn load_yaml(&self, yaml: &str) -> Result<()> {
        let raw: LanguagePackRaw =
            serde_yaml::from_str(yaml).map_err(|e| AppError::Validation(e.to_string()))?;
        let compiled = CompiledLanguagePack::compile(raw)?;
        self.insert(compiled);
        Ok(())
    }

    /// Runtime registration of a user-supplied pack; replaces any existing
    /// pack under the same language code.
    pub fn register(&self, raw: LanguagePackRaw) -> Result<()> {
        let compiled = CompiledLanguagePack::compile(raw)?;
        self.insert(compiled);
        Ok(())
    }

    fn insert(&self, compiled: CompiledLanguagePack) {
        let mut packs = self.packs.write().unwrap();
        packs.insert(compiled.language.clone(), Arc::new(compiled));
        drop(packs);
        *self.merged_cache.write().unwrap() = None;
    }

    pub fn languages(&self) -> Vec<String> {
        self.packs.read().unwrap().keys().cloned().collect()
    }

    /// Cached merged view across all loaded packs; rebuilt lazily after
    /// any load/register invalidates it.
    pub fn merged(&self) -> Arc<MergedPatternSet> {
        if let Some(cached) = self.merged_cache.read().unwrap().as_ref() {
            return cached.clone();
        }
        let packs: Vec<_> = self.packs.read().unwrap().values().cloned().collect();
        let merged = Arc::new(merge(&packs));
        *self.merged_cache.write().unwrap() = Some(merged.clone());
        merged
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_builtins_load_and_validate_minimums() {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        let langs = registry.languages();
        assert!(langs.contains(&"en".to_string()));
        assert!(langs.contains(&"de".to_string()));
    }

    #[tokio::test]
    async fn async_builtins_load() {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        registry.load_builtin_async().await.unwrap();
        assert_eq!(registry.languages().len(), 10);
    }

    #[test]
    fn merged_cache_invalidates_on_register() {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        let first = registry.merged();
        registry
            .register(LanguagePackRaw {
                language: "en".into(),
                corrections: vec!["no".into(), "wrong".into(), "not that".into()],
                short_negatives: vec![],
                questions: vec![],
                dissatisfaction: vec![],
                satisfaction_overrides: vec![],
                resolution_indicators: vec![],
                completion_claims: vec!["done".into(), "finished".into(), "complete".into()],
                system_state_claims: vec!["running".into(), "is up".into()],
                opinion_exclusions: vec![],
            })
            .unwrap();
        let second = registry.merged();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cjk_pack_rejects_word_boundary_assertions() {
        let registry = LanguageRegistry::new();
        let result = registry.register(LanguagePackRaw {
            language: "zh".into(),
            corrections: vec![r"\b不是\b".into(), "不对".into(), "错了".into()],
            short_negatives: vec![],
            questions: vec![],
            dissatisfaction: vec![],
            satisfaction_overrides: vec![],
            resolution_indicators: vec![],
            completion_claims: vec!["完成".into(), "做好了".into(), "搞定".into()],
            system_state_claims: vec!["运行中".into(), "正常".into()],
            opinion_exclusions: vec![],
        });
        assert!(result.is_err());
    }
}
