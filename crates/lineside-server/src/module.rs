//! Module startup and task wiring.
//!
//! ```text
//!                   ┌───────────── AssetRegistry ◄──────────── Dispatcher ◄── incoming lines
//!                   │ StatusReport                                 │ ACK          ▲
//!                   ▼                                              ▼              │
//!   report pump ──► OutgoingQueue ── drain ──► interlocking LinkHandle ◄── LinkDriver
//!        │
//!        └────────► DataLogger ──► console
//!                       └── backlog ──► TelemetryWriter ──► data logger LinkHandle ◄── LinkDriver
//! ```
//!
//! Losing either link never stops the module; a terminated link only leaves
//! the console.

use std::sync::Arc;

use lineside_core::{Connector, Environment};
use lineside_proto::{Command, Frame, MessageType, StatusReport};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};

use crate::{
    config::ModuleConfig,
    connection::ConnectionState,
    console::ConsoleSink,
    data_logger::DataLogger,
    dispatcher::Dispatcher,
    error::ModuleError,
    exchange::OutgoingQueue,
    link::{LinkDriver, LinkHandle},
};

/// Telemetry lines held for the data logger before new ones are dropped.
const TELEMETRY_BACKLOG: usize = 256;

/// One lineside module.
pub struct Module<E: Environment, C: Connector + Clone> {
    config: ModuleConfig,
    env: E,
    connector: C,
    console: Arc<dyn ConsoleSink>,
}

impl<E: Environment, C: Connector + Clone> Module<E, C> {
    /// Assemble a module from its configuration.
    pub fn new(config: ModuleConfig, env: E, connector: C, console: Arc<dyn ConsoleSink>) -> Self {
        Self { config, env, connector, console }
    }

    /// Build the assets, start every task and run until they all end.
    ///
    /// Only configuration problems are returned as errors.
    pub async fn run(self) -> Result<(), ModuleError> {
        let module = self.config.identity.to_string();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(self.config.build_registry(self.env.clone(), reports_tx)?);

        self.console.line(&format!("Module {module} starting"));
        for line in registry.inventory().await {
            self.console.line(&line);
        }

        let interlocking = LinkHandle::new("interlocking");
        let logger_link = LinkHandle::new("data logger");
        let (telemetry, telemetry_writer) = DataLogger::new(Arc::clone(&self.console), TELEMETRY_BACKLOG);
        let queue = Arc::new(OutgoingQueue::new(self.env.clone(), module.as_str(), self.config.exchange));
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let mut tasks = JoinSet::new();

        let logger_driver = LinkDriver::new(
            self.env.clone(),
            self.connector.clone(),
            self.config.data_logger.address(),
            self.config.links,
            logger_link.clone(),
            module.clone(),
        );
        tasks.spawn(async move {
            logger_driver.run().await;
        });
        {
            let sink = logger_link.clone();
            tasks.spawn(async move { telemetry_writer.run(&sink).await });
        }

        let handshake = Command::Handshake { identity: module.clone() };
        let handshake = Frame::new(module.as_str(), MessageType::Request, handshake.to_body());
        let interlocking_driver = LinkDriver::new(
            self.env.clone(),
            self.connector.clone(),
            self.config.interlocking.address().address(),
            self.config.links,
            interlocking.clone(),
            handshake.encode(),
        )
        .with_incoming(incoming_tx);
        tasks.spawn(async move {
            interlocking_driver.run().await;
        });

        {
            let queue = Arc::clone(&queue);
            let sink = interlocking.clone();
            let state = interlocking.subscribe();
            tasks.spawn(async move { queue.run(&sink, state).await });
        }

        tasks.spawn(pump_reports(reports_rx, Arc::clone(&queue), telemetry.clone(), module.clone()));

        let dispatcher = Arc::new(Dispatcher::new(
            module.as_str(),
            self.config.interlocking.identity.as_str(),
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::new(interlocking.clone()),
            telemetry,
        ));
        tasks.spawn(snapshot_on_connect(Arc::clone(&dispatcher), interlocking.subscribe()));
        tasks.spawn(async move { dispatcher.run(incoming_rx).await });

        tracing::info!(module = %module, assets = registry.len(), "module running");

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "module task failed");
            }
        }
        Ok(())
    }
}

/// Turn every asset state change into a queued STATE_CHANGE and a telemetry
/// line, in the order the assets produced them.
async fn pump_reports<E: Environment>(
    mut reports: mpsc::UnboundedReceiver<StatusReport>,
    queue: Arc<OutgoingQueue<E>>,
    telemetry: DataLogger,
    module: String,
) {
    while let Some(report) = reports.recv().await {
        let body = report.to_body();
        telemetry.record(&format!("{module} SENT {body}"));
        queue.push(MessageType::StateChange, body);
    }
}

/// Queue a full status snapshot every time the interlocking link connects.
async fn snapshot_on_connect<E: Environment>(
    dispatcher: Arc<Dispatcher<E>>,
    mut state: watch::Receiver<ConnectionState>,
) {
    while state.changed().await.is_ok() {
        let connected = *state.borrow_and_update() == ConnectionState::Connected;
        if connected {
            dispatcher.send_snapshot().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use lineside_proto::PointsPosition;

    use super::*;
    use crate::{
        config::ExchangeSettings, console::MemoryConsole, error::LinkError, link::LineSink,
        system_env::SystemEnv,
    };

    struct StalledSink;

    #[async_trait]
    impl LineSink for StalledSink {
        async fn send_line(&self, _line: &str) -> Result<(), LinkError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn reports_are_queued_while_the_data_logger_stalls() {
        let console = MemoryConsole::new();
        let (telemetry, writer) = DataLogger::new(Arc::new(console.clone()), 2);
        tokio::spawn(async move { writer.run(&StalledSink).await });

        let queue = Arc::new(OutgoingQueue::new(SystemEnv::new(), "MOD01", ExchangeSettings::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_reports(rx, Arc::clone(&queue), telemetry, "MOD01".into()));

        for _ in 0..10 {
            tx.send(StatusReport::Points {
                id: "940".into(),
                position: PointsPosition::Reverse,
                detected: true,
            })
            .unwrap();
        }
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), pump).await.unwrap().unwrap();
        assert_eq!(queue.len(), 10);
        assert_eq!(console.lines().len(), 10);
    }
}
