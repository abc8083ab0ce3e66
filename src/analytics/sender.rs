// src/analytics/sender.rs

use reqwest::Client;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, warn};

/// 分析数据发送器：批次经 mpsc 通道交给后台任务 POST 出去
#[derive(Clone)]
pub struct AnalyticsSender {
    sender: Sender<String>,
}

impl AnalyticsSender {
    /// 启动后台任务，需要运行中的 tokio runtime
    pub fn spawn(client: Client, endpoint: &str, buffer_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        tokio::spawn(Self::background_sender(client, endpoint.to_string(), receiver));
        Self { sender }
    }

    /// 包装已有通道，供自行发送批次的宿主使用
    pub fn from_channel(sender: Sender<String>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, batch: String) {
        if let Err(e) = self.sender.send(batch).await {
            warn!(error = %e, "analytics batch dropped, sender closed");
        }
    }

    async fn background_sender(client: Client, endpoint: String, mut receiver: Receiver<String>) {
        while let Some(batch) = receiver.recv().await {
            let bytes = batch.len();
            let result = client
                .post(&endpoint)
                .header("Content-Type", "text/plain")
                .body(batch)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(bytes, status = response.status().as_u16(), "analytics batch sent")
                }
                Ok(response) => warn!(status = response.status().as_u16(), "analytics endpoint refused batch"),
                Err(e) => warn!(error = %e, "analytics batch not delivered"),
            }
        }
        debug!("analytics sender stopped");
    }
}
