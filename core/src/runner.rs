//! Thin orchestration over [`Communicator`]: one communicator per script run.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::communicator::{Communicator, RunReport, ScriptRequest};
use crate::config::AppConfig;
use crate::context::ArgumentMap;
use crate::error::RunError;
use crate::events_out::{EventRecord, EventsOutTx};
use crate::interpreter::InterpreterFactory;
use crate::notify::UiNotifier;
use crate::responder::RuleTable;

pub struct Runner {
    cfg: AppConfig,
    rules: Arc<RuleTable>,
    factory: Arc<dyn InterpreterFactory>,
    notifier: Arc<dyn UiNotifier>,
    events_out: Option<EventsOutTx>,
}

impl Runner {
    pub fn new(
        cfg: AppConfig,
        rules: Arc<RuleTable>,
        factory: Arc<dyn InterpreterFactory>,
        notifier: Arc<dyn UiNotifier>,
    ) -> Self {
        Self {
            cfg,
            rules,
            factory,
            notifier,
            events_out: None,
        }
    }

    /// Also write `run.start` / `run.end` records.
    pub fn with_events_out(mut self, tx: EventsOutTx) -> Self {
        self.events_out = Some(tx);
        self
    }

    pub async fn run_script(
        &self,
        request: ScriptRequest,
        args: ArgumentMap,
    ) -> Result<Option<Value>, RunError> {
        self.run_script_report(request, args, None).await.result
    }

    pub async fn run_script_with_cancel(
        &self,
        request: ScriptRequest,
        args: ArgumentMap,
        cancel: oneshot::Receiver<()>,
    ) -> RunReport {
        self.run_script_report(request, args, Some(cancel)).await
    }

    async fn run_script_report(
        &self,
        request: ScriptRequest,
        args: ArgumentMap,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        self.emit(
            EventRecord::new("run.start")
                .with_run_id(&run_id)
                .with_data(json!({
                    "script": request.script.display().to_string(),
                    "cwd": request.cwd.display().to_string(),
                    "argv": &request.argv,
                })),
        )
        .await;

        let communicator = Communicator::new(
            run_id.clone(),
            self.rules.clone(),
            self.notifier.clone(),
            self.cfg.interpreter.clone(),
            self.cfg.control.clone(),
        );
        let report = communicator
            .run_to_report(self.factory.as_ref(), request, args, cancel)
            .await;

        let data = match &report.result {
            Ok(value) => json!({
                "status": "success",
                "value": value,
                "messages": report.history.len(),
            }),
            Err(err) => json!({
                "status": "failed",
                "kind": err.kind(),
                "error": err.to_string(),
                "messages": report.history.len(),
            }),
        };
        self.emit(EventRecord::new("run.end").with_run_id(&run_id).with_data(data))
            .await;
        report
    }

    async fn emit(&self, record: EventRecord) {
        if let Some(tx) = &self.events_out {
            tx.send_record(&record).await;
        }
    }
}
