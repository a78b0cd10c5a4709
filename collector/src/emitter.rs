use crate::{
    error::EmitError,
    metrics::Datapoint,
};
use bindstats_config::GraphiteEndpoint;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use tokio::{
    io::AsyncWriteExt as _,
    net::TcpStream,
    time::timeout,
};

/// Destination for serialized metric lines.
pub trait Sink: Send {
    fn write_batch<'a>(&'a mut self, payload: &'a [u8])
        -> Pin<Box<dyn Future<Output = Result<(), EmitError>> + Send + 'a>>;
}

/// Carbon plaintext protocol over TCP.
///
/// Every batch goes out on its own connection, which is shut down once the
/// payload is flushed. A connection carbon closed while idle still accepts
/// writes into the local socket buffer, so it is never reused.
#[derive(Debug, Clone)]
pub struct CarbonSink {
    address: String,
    timeout: Duration,
}

impl CarbonSink {
    pub fn new(endpoint: &GraphiteEndpoint) -> Self {
        Self::with_address(endpoint.address(), endpoint.timeout())
    }

    pub fn with_address(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn connect(&self) -> Result<TcpStream, EmitError> {
        match timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => {
                debug!(address = %self.address, "Connected to carbon");
                Ok(stream)
            }
            Ok(Err(err)) => Err(EmitError::ConnectFailed {
                address: self.address.clone(),
                reason: err.to_string(),
            }),
            Err(_) => Err(EmitError::Timeout),
        }
    }

    /// Writes until the whole payload is out, continuing after short writes.
    async fn send(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<(), EmitError> {
        let total = payload.len();
        let mut written = 0;
        while written < total {
            let n = match timeout(self.timeout, stream.write(&payload[written..])).await {
                Ok(Ok(0)) => {
                    return Err(EmitError::WriteFailed {
                        written,
                        total,
                        reason: "connection closed".to_string(),
                    })
                }
                Ok(Ok(n)) => n,
                Ok(Err(err)) => {
                    return Err(EmitError::WriteFailed {
                        written,
                        total,
                        reason: err.to_string(),
                    })
                }
                Err(_) => return Err(EmitError::Timeout),
            };
            written += n;
            trace!(sent = n, written, total, "Wrote to carbon");
        }
        match timeout(self.timeout, stream.shutdown()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(EmitError::WriteFailed {
                written,
                total,
                reason: err.to_string(),
            }),
            Err(_) => Err(EmitError::Timeout),
        }
    }
}

impl Sink for CarbonSink {
    fn write_batch<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EmitError>> + Send + 'a>> {
        Box::pin(async move {
            let mut stream = self.connect().await?;
            self.send(&mut stream, payload).await
        })
    }
}

/// Outcome of handing one cycle's datapoints to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitResult {
    pub lines: usize,
    pub bytes: usize,
    /// `true` when nothing was written because the emitter is in dry-run mode.
    pub dry_run: bool,
}

pub struct Emitter {
    sink: Box<dyn Sink>,
    dry_run: bool,
}

impl Emitter {
    pub fn new(sink: Box<dyn Sink>, dry_run: bool) -> Self {
        Self { sink, dry_run }
    }

    pub fn serialize(datapoints: &[Datapoint]) -> String {
        datapoints.iter().map(Datapoint::to_line).collect()
    }

    pub async fn emit(&mut self, datapoints: &[Datapoint]) -> Result<EmitResult, EmitError> {
        let payload = Self::serialize(datapoints);
        let result = EmitResult {
            lines: datapoints.len(),
            bytes: payload.len(),
            dry_run: self.dry_run,
        };

        if self.dry_run {
            for line in payload.lines() {
                info!("{line}");
            }
            return Ok(result);
        }
        if payload.is_empty() {
            return Ok(result);
        }

        self.sink.write_batch(payload.as_bytes()).await?;
        Ok(result)
    }
}
