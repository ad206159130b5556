//! WebSocket client helpers for talking to the agent.

use std::{fs::File, io::BufReader, sync::Arc};

use anyhow::Context;
use futures_util::SinkExt;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, connect_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream,
    WebSocketStream,
};

use crate::types::{ClientCommand, ServerMessage};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Connect to the agent; with a CA bundle the server cert is verified against it.
pub async fn connect(url: &str, tls_ca: Option<&str>) -> anyhow::Result<WsStream> {
    let ws = match tls_ca {
        Some(ca) => {
            let cfg = client_config(ca)?;
            let (ws, _) = connect_async_tls_with_config(
                url,
                None,
                false,
                Some(Connector::Rustls(Arc::new(cfg))),
            )
            .await
            .with_context(|| format!("connecting to {url}"))?;
            ws
        }
        None => {
            let (ws, _) = connect_async(url)
                .await
                .with_context(|| format!("connecting to {url}"))?;
            ws
        }
    };
    Ok(ws)
}

fn client_config(ca_path: &str) -> anyhow::Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    let mut reader = BufReader::new(
        File::open(ca_path).with_context(|| format!("opening CA file {ca_path}"))?,
    );
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert?)?;
    }
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

pub fn encode_command(cmd: &ClientCommand) -> serde_json::Result<String> {
    serde_json::to_string(cmd)
}

/// Decode a text frame; unknown shapes are `None`.
pub fn parse_frame(text: &str) -> Option<ServerMessage> {
    serde_json::from_str(text).ok()
}

pub async fn send_command<S>(sink: &mut S, cmd: &ClientCommand) -> anyhow::Result<()>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    sink.send(Message::Text(encode_command(cmd)?)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;

    #[test]
    fn commands_omit_unset_fields() {
        assert_eq!(
            encode_command(&ClientCommand::navigate("/a")).unwrap(),
            r#"{"path":"/a"}"#
        );
        assert_eq!(
            encode_command(&ClientCommand::action(ActionKind::Freeze, "/a")).unwrap(),
            r#"{"action":"freeze","target":"/a"}"#
        );
        assert_eq!(encode_command(&ClientCommand::focus("")).unwrap(), r#"{"focus":""}"#);
    }

    #[test]
    fn frames_decode() {
        let v = parse_frame(
            r#"{"location":"/","nodes":[{"name":"a","path":"/cg/a","identifier":"x","cpu_percent":1.5,"memory":2}]}"#,
        );
        match v {
            Some(ServerMessage::View(v)) => {
                assert_eq!(v.nodes.len(), 1);
                assert!(!v.nodes[0].frozen);
            }
            other => panic!("unexpected {other:?}"),
        }
        let a = parse_frame(r#"{"action":"unfreeze","target":"/cg/a","ok":true,"error":null}"#);
        assert!(matches!(a, Some(ServerMessage::Ack(ack)) if ack.ok));
        assert!(parse_frame("garbage").is_none());
    }
}
