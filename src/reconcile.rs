//! Association reconciliation between a saved URL and its labels.
//!
//! Attaches come out in first-seen order of the new set, detaches in the
//! existing display order. Both lists are free of duplicates.

use crate::command::{Command, Step};
use crate::id::UserUrlId;
use crate::label::LabelRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDelta<L> {
    pub to_attach: Vec<L>,
    pub to_detach: Vec<L>,
}

impl<L> AssociationDelta<L> {
    pub fn is_empty(&self) -> bool {
        self.to_attach.is_empty() && self.to_detach.is_empty()
    }

    /// Display positions for newly attached labels, continuing after `previous_max`.
    pub fn attach_orders(&self, previous_max: u32) -> impl Iterator<Item = (&L, u32)> {
        self.to_attach
            .iter()
            .zip(1u32..)
            .map(move |(label, offset)| (label, previous_max.saturating_add(offset)))
    }
}

impl<L: Clone + Into<LabelRef>> AssociationDelta<L> {
    /// Join-row and usage-counter commands for this delta.
    ///
    /// Detaches come first so a transaction never holds both the old and the new
    /// row for the same label.
    pub fn to_commands(&self, user_url_id: &UserUrlId, previous_max: u32) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2 * (self.to_attach.len() + self.to_detach.len()));

        for label in &self.to_detach {
            let label: LabelRef = label.clone().into();
            commands.push(Command::Detach {
                user_url_id: user_url_id.clone(),
                label: label.clone(),
            });
            commands.push(Command::AdjustUsage {
                label,
                step: Step::Decrement,
            });
        }

        for (label, order) in self.attach_orders(previous_max) {
            let label: LabelRef = label.clone().into();
            commands.push(Command::Attach {
                user_url_id: user_url_id.clone(),
                label: label.clone(),
                order,
            });
            commands.push(Command::AdjustUsage {
                label,
                step: Step::Increment,
            });
        }

        commands
    }
}

pub fn reconcile<L: PartialEq + Clone>(current: &[L], new: &[L]) -> AssociationDelta<L> {
    let mut to_attach: Vec<L> = Vec::new();
    for id in new {
        if !current.contains(id) && !to_attach.contains(id) {
            to_attach.push(id.clone());
        }
    }

    let mut to_detach: Vec<L> = Vec::new();
    for id in current {
        if !new.contains(id) && !to_detach.contains(id) {
            to_detach.push(id.clone());
        }
    }

    AssociationDelta { to_attach, to_detach }
}
