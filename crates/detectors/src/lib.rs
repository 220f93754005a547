pub mod correction;
pub mod dissatisfaction;
pub mod doom_loop;
pub mod hallucination;
pub mod similarity;
pub mod unverified_claim;

use trace_governance_models::chain::ConversationChain;
use trace_governance_models::finding::Signal;
use trace_patterns::MergedPatternSet;

/// Runs every detector against one chain. Detectors are pure and
/// chain-local; nothing here consults other chains or shared state.
pub fn detect_all(chain: &ConversationChain, patterns: &MergedPatternSet) -> Vec<Signal> {
    let mut signals = doom_loop::detect(chain);
    signals.extend(hallucination::detect(chain, patterns));
    signals.extend(correction::detect(chain, patterns));
    signals.extend(dissatisfaction::detect(chain, patterns));
    signals.extend(unverified_claim::detect(chain, patterns));
    signals
}
