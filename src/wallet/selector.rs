//! Output selection
//!
//! A deliberately simple greedy first-fit policy: walk confirmed outputs
//! in storage order, accumulating until the target is covered. Not a
//! minimal-output-count or privacy-optimized selection.

use crate::data_structures::wallet_output::WalletOutput;

/// The outputs chosen to cover a spend, with their value total
#[derive(Debug, Clone, Default)]
pub struct OutputSelection {
    pub outputs: Vec<WalletOutput>,
    pub total: u64,
}

impl OutputSelection {
    /// An empty selection signals insufficient funds (callers decline
    /// zero-amount spends before selecting, so "target is zero" never
    /// reaches here looking like a failure)
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Select the fewest leading confirmed outputs whose values sum to at
/// least `target`, or an empty selection if the full scan falls short
pub fn select_outputs(confirmed: &[WalletOutput], target: u64) -> OutputSelection {
    let mut selection = OutputSelection::default();
    for output in confirmed {
        if selection.total >= target {
            break;
        }
        debug_assert!(output.is_confirmed());
        selection.total += output.value;
        selection.outputs.push(output.clone());
    }
    if selection.total < target {
        // Partial cover is never returned.
        return OutputSelection::default();
    }
    selection
}
