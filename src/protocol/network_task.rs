//! Network provisioning worker.
//!
//! Wi-Fi association blocks for seconds, so it runs on its own thread and
//! never on the connection loop. The loop enqueues a [`NetworkJob`]; this
//! worker awaits the job channel, calls [`NetworkPort::join`], and posts a
//! [`JoinOutcome`] back. A response to the peer never waits for the join.

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::app::ports::NetworkPort;

use super::channels::{JoinOutcome, JoinQueue, NetworkJob, OutcomeQueue};

const WORKER_STACK: usize = 8 * 1024;

/// Serve join requests until [`NetworkJob::Shutdown`].
pub async fn serve(network: &mut impl NetworkPort, jobs: &JoinQueue, outcomes: &OutcomeQueue) {
    loop {
        match jobs.receive().await {
            NetworkJob::Join { ssid, passphrase } => {
                info!("NET: joining '{}'", ssid);
                let joined = network.join(&ssid, &passphrase);
                if outcomes.try_send(JoinOutcome { ssid, joined }).is_err() {
                    warn!("NET: outcome channel full, result dropped");
                }
            }
            NetworkJob::Shutdown => break,
        }
    }
    info!("NET: worker stopped");
}

/// Spawn the worker thread. It owns `network` for its whole life.
pub fn spawn<N>(
    mut network: N,
    jobs: Arc<JoinQueue>,
    outcomes: Arc<OutcomeQueue>,
) -> std::io::Result<JoinHandle<()>>
where
    N: NetworkPort + Send + 'static,
{
    std::thread::Builder::new()
        .name("net-worker".into())
        .stack_size(WORKER_STACK)
        .spawn(move || {
            let executor: edge_executor::LocalExecutor<'_, 2> = edge_executor::LocalExecutor::new();
            futures_lite::future::block_on(executor.run(serve(&mut network, &jobs, &outcomes)));
        })
}
