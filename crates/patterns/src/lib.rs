pub mod lang;
pub mod redaction;

pub use lang::{CompiledLanguagePack, LanguagePackRaw, LanguageRegistry, MergedPatternSet};
pub use redaction::{RedactionMatch, RedactionPattern, RedactionRegistry};
