use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::block::{Header, I3BarBlock};
use crate::error::ProtocolError;

/// Serialize one bar as a JSON array, without the trailing separator.
pub fn encode_line(blocks: &[I3BarBlock]) -> Result<String, ProtocolError> {
    serde_json::to_string(blocks).map_err(ProtocolError::Encode)
}

/// Writes the output half of the protocol. Every write is flushed so the
/// host sees complete lines only.
pub struct ProtocolWriter<W> {
    out: W,
    lines: u64,
}

impl<W> ProtocolWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    pub async fn write_header(&mut self, header: &Header) -> Result<(), ProtocolError> {
        let mut text = serde_json::to_string(header).map_err(ProtocolError::Encode)?;
        text.push_str("\n[\n");
        self.write_raw(&text).await
    }

    /// Emit one already-encoded bar line.
    pub async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let mut text = String::with_capacity(line.len() + 2);
        text.push_str(line);
        text.push_str(",\n");
        self.write_raw(&text).await?;
        self.lines += 1;
        Ok(())
    }

    /// Final empty bar, then close the endless array.
    pub async fn write_final(&mut self) -> Result<(), ProtocolError> {
        self.write_raw("[]\n]\n").await?;
        self.out.shutdown().await.map_err(ProtocolError::Write)
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    async fn write_raw(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.out
            .write_all(text.as_bytes())
            .await
            .map_err(ProtocolError::Write)?;
        self.out.flush().await.map_err(ProtocolError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_is_valid_json_once_closed() {
        let mut writer = ProtocolWriter::new(Vec::new());
        writer.write_header(&Header::new(false)).await.unwrap();
        let line = encode_line(&[I3BarBlock {
            full_text: "a".to_string(),
            ..I3BarBlock::default()
        }])
        .unwrap();
        writer.write_line(&line).await.unwrap();
        writer.write_final().await.unwrap();
        assert_eq!(writer.lines_written(), 1);

        let text = String::from_utf8(writer.out).unwrap();
        let mut parts = text.splitn(2, '\n');
        let header: serde_json::Value = serde_json::from_str(parts.next().unwrap()).unwrap();
        assert_eq!(header["version"], 1);

        let body: serde_json::Value = serde_json::from_str(parts.next().unwrap()).unwrap();
        let bars = body.as_array().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0][0]["full_text"], "a");
        assert!(bars[1].as_array().unwrap().is_empty());
    }
}
