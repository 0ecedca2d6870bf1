use vigil_ports::{NarrativeComposer, NarrativeInput};

/// One-paragraph chronology: time span, accounts, and each account's
/// strongest signal
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronologyNarrative;

impl NarrativeComposer for ChronologyNarrative {
    fn compose(&self, input: &NarrativeInput) -> String {
        let span = match (input.first_event, input.last_event) {
            (Some(first), Some(last)) => format!(
                "Between {} and {} UTC",
                first.format("%Y-%m-%d %H:%M:%S"),
                last.format("%Y-%m-%d %H:%M:%S")
            ),
            _ => "Recently".to_string(),
        };

        let reasons: Vec<String> = input
            .accounts
            .iter()
            .map(|account| match input.top_signals.get(account) {
                Some((signal, value)) => format!("{} {}={:.3}", account, signal, value),
                None => format!("{} unknown", account),
            })
            .collect();

        format!(
            "{}, accounts [{}] exhibited patterns ({}). See attached evidence pack for event chronology and contributing signals.",
            span,
            input.accounts.join(", "),
            reasons.join("; ")
        )
    }
}
