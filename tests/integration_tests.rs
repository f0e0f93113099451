use color_eyre::eyre::{eyre, Result, WrapErr};
use serial_http_bridge::common::test_utils::{stub_link, DeviceStub};
use serial_http_bridge::{BridgeConfig, BridgeServer, HttpConfig, HttpFront, SerialLink};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct RunningBridge {
    addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    server: JoinHandle<serial_http_bridge::Result<()>>,
    link: SerialLink<WriteHalf<DuplexStream>>,
}

impl RunningBridge {
    async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.server.await??;
        self.link.close().await;
        Ok(())
    }
}

/// Starts the HTTP front on an ephemeral port, wired to an in-memory device
async fn start_bridge(response_timeout: Duration) -> Result<(RunningBridge, DeviceStub)> {
    let config = BridgeConfig::default()
        .with_bind_addr("127.0.0.1:0".parse()?)
        .with_response_timeout(response_timeout);
    let (link, device) = stub_link(&config);

    let front = HttpFront::new(
        HttpConfig {
            server_name: None,
            ..config.http.clone()
        },
        link.correlator(),
    );
    let listener = front.bind().await?;
    let addr = listener.local_addr()?;
    let shutdown = front.shutdown_signal();
    let server = tokio::spawn(async move { front.serve(listener).await });

    Ok((
        RunningBridge {
            addr,
            shutdown,
            server,
            link,
        },
        device,
    ))
}

async fn http_get(addr: SocketAddr, path: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .await
        .wrap_err_with(|| format!("Failed to connect to {addr}"))?;
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
        .await?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .wrap_err("Failed to read response")?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

#[tokio::test]
async fn test_device_http_response_is_relayed_verbatim() -> Result<()> {
    let (bridge, mut device) = start_bridge(Duration::from_secs(2)).await?;

    let device_task = tokio::spawn(async move {
        let request = device.next_request().await?;
        device
            .send_lines(&["Web request received", "RX: 'G' RX: 'E' RX: 'T' [NEWLINE]"])
            .await?;
        device
            .send_raw(b"=== HTTP REQUEST ===\nHTTP/1.1 200 OK\r\n\r\nhello\n=== END HTTP RESPONSE ===\n")
            .await?;
        Ok::<_, std::io::Error>((request, device))
    });

    let response = http_get(bridge.addr, "/").await?;
    assert_eq!(response, "HTTP/1.1 200 OK\r\n\r\nhello\n");

    let (request, _device) = device_task.await??;
    assert_eq!(request.as_deref(), Some("GET /"));

    bridge.stop().await
}

#[tokio::test]
async fn test_silent_device_yields_gateway_timeout() -> Result<()> {
    let (bridge, mut device) = start_bridge(Duration::from_millis(300)).await?;

    let device_task = tokio::spawn(async move {
        device.next_request().await?;
        device.send_lines(&["busy trading", "still busy"]).await?;
        Ok::<_, std::io::Error>(device)
    });

    let response = http_get(bridge.addr, "/api/pokemon").await?;
    assert!(
        response.starts_with("HTTP/1.1 504 Gateway Timeout\r\n"),
        "unexpected response: {response:?}"
    );

    let _device = device_task.await??;
    bridge.stop().await
}

#[tokio::test]
async fn test_device_timeout_report_is_an_empty_success() -> Result<()> {
    let (bridge, mut device) = start_bridge(Duration::from_secs(2)).await?;

    let device_task = tokio::spawn(async move {
        device.next_request().await?;
        device
            .send_lines(&["=== HTTP REQUEST (TIMEOUT) ===", "=== END HTTP RESPONSE ==="])
            .await?;
        Ok::<_, std::io::Error>(device)
    });

    let response = http_get(bridge.addr, "/").await?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-length: 0\r\n"));
    assert!(response.ends_with("\r\n\r\n"));

    let _device = device_task.await??;
    bridge.stop().await
}

#[tokio::test]
async fn test_bare_content_is_wrapped_as_html() -> Result<()> {
    let (bridge, mut device) = start_bridge(Duration::from_secs(2)).await?;

    let device_task = tokio::spawn(async move {
        device.next_request().await?;
        device.respond(&["<ul>", "<li>PIKACHU</li>", "</ul>"]).await?;
        Ok::<_, std::io::Error>(device)
    });

    let response = http_get(bridge.addr, "/pokemon.html").await?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-type: text/html\r\n"));
    assert!(response.contains("access-control-allow-origin: *\r\n"));
    assert!(response.ends_with("\r\n\r\n<ul>\n<li>PIKACHU</li>\n</ul>\n"));

    let _device = device_task.await??;
    bridge.stop().await
}

#[tokio::test]
async fn test_concurrent_browser_requests_are_serialized() -> Result<()> {
    let (bridge, mut device) = start_bridge(Duration::from_secs(2)).await?;
    let in_flight = Arc::new(Mutex::new(0usize));
    let max_in_flight = Arc::new(Mutex::new(0usize));

    let (counter, peak) = (in_flight.clone(), max_in_flight.clone());
    let device_task = tokio::spawn(async move {
        while let Some(request) = device.next_request().await? {
            {
                let mut current = counter.lock().unwrap();
                *current += 1;
                let mut peak = peak.lock().unwrap();
                *peak = (*peak).max(*current);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            device.respond(&[request.as_str()]).await?;
            *counter.lock().unwrap() -= 1;
        }
        Ok::<_, std::io::Error>(())
    });

    let client_count = 5;
    let mut handles = Vec::new();
    for i in 0..client_count {
        let addr = bridge.addr;
        handles.push(tokio::spawn(async move {
            let response = http_get(addr, &format!("/item/{i}")).await?;
            if !response.ends_with(&format!("GET /item/{i}\n")) {
                return Err(eyre!("client {i} got someone else's response: {response:?}"));
            }
            Ok::<(), color_eyre::eyre::Error>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(*max_in_flight.lock().unwrap(), 1);

    bridge.stop().await?;
    device_task.await??;
    Ok(())
}
