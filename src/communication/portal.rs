use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_svc::http::{Headers, Method};
use embedded_svc::io::{Read, Write};
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, Configuration};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};
use serde::Deserialize;

use crate::communication::network_manager::{NVS_NAMESPACE, NVS_PASSWORD_KEY, NVS_SSID_KEY};

const PORTAL_AP_SSID: &str = "motion-cam-setup";
const PORTAL_AP_PASSWORD: &str = "motioncam";
const MAX_HTTP_BODY: usize = 1024;

const PORTAL_INDEX_HTML: &str = r#"<!doctype html>
<html lang="ja">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Motion Cam Setup</title>
</head>
<body>
  <h1>Motion Cam WiFi設定</h1>
  <p>SSIDとパスワードを保存するとデバイスが再起動します。</p>
  <label>SSID</label><input id="ssid" type="text"><br>
  <label>Password</label><input id="pass" type="password"><br>
  <button id="save">保存</button>
  <div id="status"></div>
  <script>
    document.getElementById('save').addEventListener('click', async () => {
      const body = JSON.stringify({ssid: document.getElementById('ssid').value,
                                   password: document.getElementById('pass').value});
      const r = await fetch('/api/wifi', {method: 'POST',
        headers: {'content-type': 'application/json'}, body});
      document.getElementById('status').textContent =
        r.ok ? '保存しました。再起動します…' : '保存に失敗しました';
    });
  </script>
</body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("APモードの起動に失敗: {0}")]
    ApStart(String),
    #[error("HTTPサーバーの起動に失敗: {0}")]
    HttpServer(String),
}

/// ポータルの結果。資格情報が保存された場合は再起動するため値は返らない。
#[derive(Debug, PartialEq, Eq)]
pub enum PortalOutcome {
    TimedOut,
}

#[derive(Debug, Deserialize)]
struct WifiCredentialUpdate {
    ssid: String,
    #[serde(default)]
    password: String,
}

/// 時間制限付きの設定ポータルを実行する
///
/// APモードで起動し、キャプティブポータル経由でWiFi資格情報を受け取って
/// NVSに保存する。保存後はデバイスを再起動する（この関数から戻らない）。
/// 人間が現れないままタイムアウトした場合は `TimedOut` を返し、呼び出し側
/// がフォールバックスリープへ移行する。無期限に待つことはしない。
pub fn run_portal(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    nvs_partition: &EspDefaultNvsPartition,
    timeout: Duration,
) -> Result<PortalOutcome, PortalError> {
    let _ = wifi.stop();

    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: PORTAL_AP_SSID
            .try_into()
            .map_err(|_| PortalError::ApStart("AP SSID too long".to_string()))?,
        password: PORTAL_AP_PASSWORD
            .try_into()
            .map_err(|_| PortalError::ApStart("AP password too long".to_string()))?,
        auth_method: AuthMethod::WPA2Personal,
        channel: 1,
        ..Default::default()
    }))
    .map_err(|e| PortalError::ApStart(e.to_string()))?;
    wifi.start().map_err(|e| PortalError::ApStart(e.to_string()))?;
    wifi.wait_netif_up()
        .map_err(|e| PortalError::ApStart(e.to_string()))?;
    info!(
        "設定ポータルAPを起動しました: `{}` (タイムアウト {}秒)",
        PORTAL_AP_SSID,
        timeout.as_secs()
    );

    let mut server = EspHttpServer::new(&HttpConfiguration::default())
        .map_err(|e| PortalError::HttpServer(e.to_string()))?;

    // 各OSのキャプティブポータル検出パスにも設定ページを返す
    for path in [
        "/",
        "/generate_204",
        "/gen_204",
        "/hotspot-detect.html",
        "/connecttest.txt",
        "/ncsi.txt",
    ] {
        server
            .fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
                req.into_ok_response()?
                    .write_all(PORTAL_INDEX_HTML.as_bytes())?;
                Ok(())
            })
            .map_err(|e| PortalError::HttpServer(e.to_string()))?;
    }

    let saved = Arc::new(AtomicBool::new(false));
    {
        let saved = Arc::clone(&saved);
        let nvs_partition = nvs_partition.clone();
        server
            .fn_handler::<anyhow::Error, _>("/api/wifi", Method::Post, move |mut req| {
                let len = req.content_len().unwrap_or(0) as usize;
                if len == 0 || len > MAX_HTTP_BODY {
                    req.into_status_response(400)?
                        .write_all(b"{\"error\":\"invalid body\"}")?;
                    return Ok(());
                }

                let mut body = vec![0u8; len];
                req.read_exact(&mut body)?;
                let update: WifiCredentialUpdate = match serde_json::from_slice(&body) {
                    Ok(u) => u,
                    Err(_) => {
                        req.into_status_response(400)?
                            .write_all(b"{\"error\":\"invalid json\"}")?;
                        return Ok(());
                    }
                };
                if update.ssid.is_empty() {
                    req.into_status_response(400)?
                        .write_all(b"{\"error\":\"ssid required\"}")?;
                    return Ok(());
                }

                let mut nvs = EspNvs::new(nvs_partition.clone(), NVS_NAMESPACE, true)?;
                nvs.set_str(NVS_SSID_KEY, &update.ssid)?;
                nvs.set_str(NVS_PASSWORD_KEY, &update.password)?;
                info!("WiFi資格情報を保存しました: {}", update.ssid);

                saved.store(true, Ordering::Relaxed);
                req.into_ok_response()?.write_all(b"{\"saved\":true}")?;
                Ok(())
            })
            .map_err(|e| PortalError::HttpServer(e.to_string()))?;
    }

    let deadline = Instant::now() + timeout;
    loop {
        if saved.load(Ordering::Relaxed) {
            // レスポンスが届くまで少し待ってから新しい資格情報で再起動
            info!("資格情報を保存しました。再起動します");
            FreeRtos::delay_ms(1_500);
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
        if Instant::now() >= deadline {
            warn!("設定ポータルがタイムアウトしました");
            drop(server);
            let _ = wifi.stop();
            return Ok(PortalOutcome::TimedOut);
        }
        FreeRtos::delay_ms(200);
    }
}
