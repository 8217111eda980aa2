//! Renderer side of the protocol: connect to a listener and stream an image.
//!
//! No reconnect logic; a failed send surfaces as an error and the caller
//! decides what to do.

use futures::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::codec::AtonCodec;
use crate::error::AtonError;
use crate::message::{Message, OpenImage, TileData};

pub struct RenderSender {
    framed: Framed<TcpStream, AtonCodec>,
}

impl RenderSender {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, AtonCodec::new()),
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, AtonError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Encode and flush one message.
    pub async fn send(&mut self, message: Message) -> Result<(), AtonError> {
        self.framed.send(message).await
    }

    pub async fn open_image(
        &mut self,
        width: u32,
        height: u32,
        render_region_area: u32,
    ) -> Result<(), AtonError> {
        self.send(Message::OpenImage(OpenImage {
            width,
            height,
            render_region_area,
        }))
        .await
    }

    pub async fn send_tile(&mut self, tile: TileData) -> Result<(), AtonError> {
        self.send(Message::TileData(tile)).await
    }

    pub async fn close_image(&mut self) -> Result<(), AtonError> {
        self.send(Message::CloseImage).await
    }

    /// Ask the listener to stop accepting renderers.
    pub async fn shutdown(&mut self) -> Result<(), AtonError> {
        self.send(Message::Shutdown).await
    }

    /// Write raw bytes past the codec (for exercising malformed input).
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), AtonError> {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Flush and close the write half of the connection.
    pub async fn finish(mut self) -> Result<(), AtonError> {
        SinkExt::<Message>::close(&mut self.framed).await
    }
}
