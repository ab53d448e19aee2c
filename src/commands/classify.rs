//! `shiprail classify`: check commit subjects against the conventional grammar

use crate::core::context::WorkspaceContext;
use crate::core::error::{ShipError, ShipResult};
use crate::release::classifier::{BatchItem, BatchOutcome, ClassificationError, Classifier};
use crate::ui::output::{OutputFormat, print_output};
use std::fmt::{self, Write};

/// Classify each text independently; any rejected item fails the command after all are reported
pub fn run_classify(ctx: &WorkspaceContext, texts: Vec<String>, format: OutputFormat) -> ShipResult<()> {
  let classifier = ctx.config.classifier();
  let items = classify_all(&classifier, texts);
  print_output(format, &items, |out| render_items(out, &items))?;

  let rejected: Vec<ClassificationError> = items.iter().filter_map(rejection).collect();
  if let Some(first) = rejected.first() {
    if rejected.len() > 1 {
      tracing::warn!(rejected = rejected.len(), total = items.len(), "inputs rejected");
    }
    return Err(ShipError::Classification(first.clone()));
  }
  Ok(())
}

/// Inputs are keyed by position, e.g. `#1`
pub(crate) fn classify_all(classifier: &Classifier, texts: Vec<String>) -> Vec<BatchItem> {
  let inputs: Vec<(String, String)> = texts
    .into_iter()
    .enumerate()
    .map(|(idx, text)| (text, format!("#{}", idx + 1)))
    .collect();
  classifier.classify_batch(&inputs)
}

pub(crate) fn rejection(item: &BatchItem) -> Option<ClassificationError> {
  match item.outcome {
    BatchOutcome::Rejected { reason } => Some(ClassificationError {
      reason,
      input: item.input.clone(),
    }),
    BatchOutcome::Classified(_) => None,
  }
}

fn render_items(out: &mut String, items: &[BatchItem]) -> fmt::Result {
  for item in items {
    match &item.outcome {
      BatchOutcome::Classified(classification) => {
        let descriptor = &classification.descriptor;
        let breaking = if descriptor.is_breaking() { " [BREAKING]" } else { "" };
        writeln!(out, "✅ {}{}", descriptor.change_type(), breaking)?;
        if let Some(scope) = descriptor.scope() {
          writeln!(out, "   scope:       {}", scope)?;
        }
        writeln!(out, "   description: {}", descriptor.description())?;
        for warning in &classification.warnings {
          writeln!(out, "   ⚠️  {}", warning)?;
        }
      }
      BatchOutcome::Rejected { reason } => {
        writeln!(out, "❌ {}", item.input)?;
        writeln!(out, "   reason: {}", reason)?;
      }
    }
  }
  Ok(())
}
