//! STOMP 1.2 client over TCP.

pub mod frame;

use self::frame::{Frame, read_frame, write_frame};
use super::config::BrokerConfig;
use super::connection::{Connection, Message};
use super::error::BrokerError;
use super::message::Destination;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

pub struct StompConnection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    subscriptions: HashMap<Destination, String>,
    next_id: u64,
}

impl StompConnection<TcpStream> {
    /// Connects to the first broker of the list that accepts the session.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        for address in &config.brokers {
            let stream = match TcpStream::connect((address.host.as_str(), address.port)).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Could not reach broker {}: {}", address, e);
                    continue;
                }
            };
            match Self::handshake(stream, config, &address.host).await {
                Ok(connection) => {
                    info!("Connected to broker {}", address);
                    return Ok(connection);
                }
                Err(e) => warn!("Broker {} rejected the session: {}", address, e),
            }
        }
        Err(BrokerError::Unreachable {
            attempts: config.brokers.len(),
        })
    }
}

impl<S> StompConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Opens a session over an established stream.
    pub async fn handshake(stream: S, config: &BrokerConfig, host: &str) -> Result<Self, BrokerError> {
        let (reader, writer) = tokio::io::split(stream);
        let mut connection = Self {
            reader: BufReader::new(reader),
            writer,
            subscriptions: HashMap::new(),
            next_id: 0,
        };

        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("login", config.user.as_str())
            .header("passcode", config.password.as_str())
            .header("client-id", config.client_id.as_str())
            .header("heart-beat", "0,0");
        write_frame(&mut connection.writer, &connect).await?;

        match read_frame(&mut connection.reader).await? {
            Some(frame) if frame.command == "CONNECTED" => {
                debug!(
                    "STOMP session established (version {})",
                    frame.get("version").unwrap_or("unknown")
                );
                Ok(connection)
            }
            Some(frame) if frame.command == "ERROR" => Err(refusal(&frame)),
            Some(frame) => Err(BrokerError::UnexpectedFrame {
                command: frame.command,
                expected: "CONNECTED",
            }),
            None => Err(BrokerError::ConnectionClosed),
        }
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

fn refusal(frame: &Frame) -> BrokerError {
    let mut message = frame.get("message").unwrap_or("ERROR frame").to_string();
    if let Ok(details) = frame.body_text() {
        let details = details.trim();
        if !details.is_empty() {
            message = format!("{message}: {details}");
        }
    }
    BrokerError::Refused { message }
}

impl<S> Connection for StompConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&mut self, destination: &Destination, body: &str) -> Result<(), BrokerError> {
        let frame = Frame::new("SEND")
            .header("destination", destination.as_str())
            .header("content-type", "application/json")
            .body(body);
        debug!("SEND {} ({} bytes)", destination, body.len());
        write_frame(&mut self.writer, &frame).await
    }

    async fn subscribe(&mut self, destination: &Destination) -> Result<(), BrokerError> {
        if self.subscriptions.contains_key(destination) {
            return Ok(());
        }
        let id = self.next_id();
        let frame = Frame::new("SUBSCRIBE")
            .header("id", id.as_str())
            .header("destination", destination.as_str())
            .header("ack", "auto");
        write_frame(&mut self.writer, &frame).await?;
        debug!("Subscribed to {} as {}", destination, id);
        self.subscriptions.insert(destination.clone(), id);
        Ok(())
    }

    async fn unsubscribe(&mut self, destination: &Destination) -> Result<(), BrokerError> {
        let id = self
            .subscriptions
            .remove(destination)
            .ok_or_else(|| BrokerError::NotSubscribed(destination.to_string()))?;
        write_frame(&mut self.writer, &Frame::new("UNSUBSCRIBE").header("id", id)).await?;
        debug!("Unsubscribed from {}", destination);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, BrokerError> {
        loop {
            let Some(frame) = read_frame(&mut self.reader).await? else {
                return Ok(None);
            };
            match frame.command.as_str() {
                "MESSAGE" => {
                    let destination = Destination::new(frame.get("destination").unwrap_or_default());
                    let Ok(body) = frame.body_text() else {
                        warn!(
                            "Dropping message on {} with a body that is not UTF-8 ({} bytes)",
                            destination,
                            frame.body.len()
                        );
                        continue;
                    };
                    debug!("MESSAGE {} ({} bytes)", destination, body.len());
                    return Ok(Some(Message {
                        destination,
                        body: body.to_string(),
                    }));
                }
                "ERROR" => return Err(refusal(&frame)),
                other => debug!("Ignoring '{}' frame", other),
            }
        }
    }

    async fn disconnect(mut self) -> Result<(), BrokerError> {
        let receipt = format!("disconnect-{}", self.next_id());
        let frame = Frame::new("DISCONNECT").header("receipt", receipt.as_str());
        write_frame(&mut self.writer, &frame).await?;
        while let Some(frame) = read_frame(&mut self.reader).await? {
            if frame.command == "RECEIPT" && frame.get("receipt-id") == Some(receipt.as_str()) {
                break;
            }
            debug!("Discarding '{}' frame received while disconnecting", frame.command);
        }
        self.writer.shutdown().await?;
        debug!("Disconnected from broker");
        Ok(())
    }
}
