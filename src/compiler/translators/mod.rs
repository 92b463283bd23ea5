//! One translator per node category. Every translator returns the steps to
//! inline at the current position: a single block named after the node
//! variable, with the node's continuation inlined inside it.

mod actions;
mod branching;
mod loops;
mod messaging;
mod subflow;

use super::context::{CompileSession, LOOP_CONTINUE, NO_REACHABLE_ACTION, Scope};
use super::edges::Port;
use crate::error::CompileError;
use crate::flow::{Node, NodeKind};
use crate::program::Step;
use serde_json::json;

pub use loops::{LOOP_INDEX, LOOP_ITEM};
pub use messaging::MAX_PROMPT_ATTEMPTS;

impl<'a> CompileSession<'a> {
    /// Translates `node` and everything reachable through its linear ports.
    pub(crate) fn translate_node(
        &mut self,
        node: &'a Node,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        if scope.loop_end.as_deref() == Some(node.id.as_str()) {
            return Ok(Vec::new());
        }
        if scope.path.iter().any(|id| id == &node.id) {
            return Err(CompileError::CycleDetected {
                node_id: node.id.clone(),
            });
        }

        tracing::debug!(node_id = %node.id, node_type = node.type_name(), "translating node");
        scope.path.push(node.id.clone());
        let steps = match &node.kind {
            NodeKind::Delay(_) if scope.inside_loop => {
                tracing::debug!(node_id = %node.id, "skipping delay inside loop body");
                self.translate_next(node, &Port::next_step(), scope)
            }
            NodeKind::SendText(data) => self.translate_send_text(node, data, scope),
            NodeKind::SendButtons(data) => self.translate_buttons(node, data, scope),
            NodeKind::SendList(data) => self.translate_list(node, data, scope),
            NodeKind::Delay(data) => self.translate_delay(node, data, scope),
            NodeKind::ConditionalSplit(data) => self.translate_split(node, data, scope),
            NodeKind::ConditionalBranch(data) => self.translate_branch(node, data, scope),
            NodeKind::SaveData(data) => self.translate_save_data(node, data, scope),
            NodeKind::SaveVariable(data) => self.translate_save_variable(node, data, scope),
            NodeKind::LoopStart(data) => self.translate_loop(node, data, scope),
            NodeKind::ApiCall(data) => self.translate_api_call(node, data, scope),
            NodeKind::Webhook(data) => self.translate_webhook(node, data, scope),
            NodeKind::Subflow(data) => self.translate_subflow(node, data, scope),
            NodeKind::Alert(data) => self.translate_alert(node, data, scope),
            NodeKind::UtilityFunction(data) => self.translate_utility(node, data, scope),
            NodeKind::Trigger(_) | NodeKind::LoopEnd | NodeKind::Unsupported { .. } => {
                Ok(self.translate_terminal(node, scope))
            }
        };
        scope.path.pop();
        steps
    }

    /// Continues with the node behind `port`; an unconnected port ends the chain.
    pub(crate) fn translate_next(
        &mut self,
        node: &'a Node,
        port: &Port,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        match self.graph.next_node(&node.id, port) {
            Some(next) => self.translate_node(next, scope),
            None => Ok(Vec::new()),
        }
    }

    /// Nodes with nothing to emit end the current routine. In `main` the
    /// return comes before the trailing session cleanup, so a run ending here
    /// leaves its session to expire on the backend.
    fn translate_terminal(&mut self, node: &'a Node, scope: &Scope) -> Vec<Step> {
        if let NodeKind::Unsupported { type_name } = &node.kind {
            tracing::warn!(node_id = %node.id, node_type = %type_name, "unsupported node type");
        }
        let names = self.names_for(node);
        let sentinel = if scope.inside_loop {
            LOOP_CONTINUE
        } else {
            NO_REACHABLE_ACTION
        };
        vec![Step::returns(names.var, json!(sentinel))]
    }
}
