//! Device API routes
//!
//! | Method | Path                  | Auth |
//! |--------|-----------------------|------|
//! | GET    | `/api/status`         | no   |
//! | GET    | `/api/wifi`           | yes  |
//! | GET    | `/api/gas`            | yes  |
//! | POST   | `/api/gas/calibrate`  | yes  |
//! | GET    | `/api/camera`         | yes  |
//! | GET    | `/capture`            | yes  |
//! | POST   | `/api/restart`        | yes  |

use alloc::string::String;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use super::request::{Method, Request};
use super::response::{PostAction, Response, Status};
use crate::auth::{AccessGuard, WWW_AUTHENTICATE_HEADER};
use crate::camera::{Camera, CameraError};
use crate::config::{Capabilities, DeviceIdentity};
use crate::security::log_security_event;
use crate::sensors::AnalogSampler;
use crate::sensors::gas::{CalibrationError, GasSensor};
use crate::telemetry::{DeviceSnapshot, write_camera_status_json, write_status_json};

/// Source of the runtime figures in `/api/status` and `/api/wifi`.
pub trait SystemInfo {
    fn snapshot(&self) -> DeviceSnapshot;
}

/// Everything a request handler can reach.
pub struct ApiContext<'a, M: RawMutex, S, C, P> {
    pub identity: &'a DeviceIdentity,
    pub guard: &'a AccessGuard,
    pub capabilities: Capabilities,
    pub gas: &'a GasSensor<M, S>,
    pub camera: &'a AsyncMutex<M, C>,
    pub system: &'a P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Status,
    Wifi,
    Gas,
    Calibrate,
    CameraStatus,
    Capture,
    Restart,
}

impl Route {
    fn resolve(method: Method, path: &str) -> Option<Self> {
        match (method, path) {
            (Method::Get, "/api/status") => Some(Self::Status),
            (Method::Get, "/api/wifi") => Some(Self::Wifi),
            (Method::Get, "/api/gas") => Some(Self::Gas),
            (Method::Post, "/api/gas/calibrate") => Some(Self::Calibrate),
            (Method::Get, "/api/camera") => Some(Self::CameraStatus),
            (Method::Get, "/capture") => Some(Self::Capture),
            (Method::Post, "/api/restart") => Some(Self::Restart),
            _ => None,
        }
    }

    const fn is_public(self) -> bool {
        matches!(self, Self::Status)
    }
}

/// Answer one request. Calibration runs inline, so a calibrate request
/// holds this handler for the whole sampling window.
pub async fn handle<M, S, C, P, D>(
    ctx: &ApiContext<'_, M, S, C, P>,
    request: &Request<'_>,
    delay: &mut D,
) -> Response
where
    M: RawMutex,
    S: AnalogSampler,
    C: Camera,
    P: SystemInfo,
    D: DelayNs,
{
    let Some(route) = Route::resolve(request.method, request.path) else {
        return Response::not_found();
    };

    if !route.is_public() {
        if let Err(challenge) = ctx.guard.require(request) {
            log_security_event(&ctx.capabilities, "auth_failed", request.path);
            return Response::text(Status::Unauthorized, challenge.message())
                .with_header(WWW_AUTHENTICATE_HEADER, challenge.www_authenticate());
        }
    }

    let mut body = String::new();
    match route {
        Route::Status => {
            ctx.system.snapshot().write_json(ctx.identity, &mut body);
            Response::json(Status::Ok, body)
        }
        Route::Wifi => {
            ctx.system.snapshot().wifi.write_json(&mut body);
            Response::json(Status::Ok, body)
        }
        Route::Gas => {
            ctx.gas.telemetry().write_json(&mut body);
            Response::json(Status::Ok, body)
        }
        Route::Calibrate => calibrate(ctx.gas, delay, body).await,
        Route::CameraStatus => {
            let status = ctx.camera.lock().await.status();
            write_camera_status_json(&status, &mut body);
            Response::json(Status::Ok, body)
        }
        Route::Capture => {
            let frame = ctx.camera.lock().await.capture();
            match frame {
                Ok(frame) => Response::jpeg(frame.jpeg)
                    .with_header("Content-Disposition", "inline; filename=capture.jpg"),
                Err(CameraError::NotInitialized) => {
                    Response::text(Status::ServiceUnavailable, "Camera not initialized")
                }
                Err(CameraError::CaptureFailed) => {
                    warn!("Camera capture failed");
                    Response::text(Status::InternalServerError, "Camera capture failed")
                }
            }
        }
        Route::Restart => {
            info!("Restart requested over HTTP");
            write_status_json("restarting", &mut body);
            Response::json(Status::Ok, body).with_action(PostAction::Restart)
        }
    }
}

async fn calibrate<M, S, D>(gas: &GasSensor<M, S>, delay: &mut D, mut body: String) -> Response
where
    M: RawMutex,
    S: AnalogSampler,
    D: DelayNs,
{
    match gas.calibrate(delay).await {
        Ok(ro) => {
            let mut obj = crate::telemetry::JsonObject::new(&mut body);
            obj.str("status", "calibrated").float("ro", ro);
            obj.finish();
            Response::json(Status::Ok, body)
        }
        Err(CalibrationError::InProgress) => {
            write_status_json("busy", &mut body);
            Response::json(Status::Conflict, body)
        }
        Err(_) => {
            write_status_json("failed", &mut body);
            Response::json(Status::Ok, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSettings, CameraStatus, Frame, NoCamera};
    use crate::config::AuthConfig;
    use crate::sensors::SensorError;
    use crate::sensors::gas::GasSensorConfig;
    use crate::telemetry::WifiInfo;
    use alloc::vec;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type M = CriticalSectionRawMutex;

    struct ScriptedSampler<'a> {
        raw: &'a Cell<u16>,
    }

    impl AnalogSampler for ScriptedSampler<'_> {
        async fn read_raw(&mut self) -> Result<u16, SensorError> {
            Ok(self.raw.get())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    struct FixedSystemInfo;

    impl SystemInfo for FixedSystemInfo {
        fn snapshot(&self) -> DeviceSnapshot {
            DeviceSnapshot {
                uptime_secs: 5,
                heap_free: 100,
                heap_total: 200,
                wifi: WifiInfo {
                    ssid: String::from("lab"),
                    rssi: Some(-40),
                    ip: Some([10, 0, 0, 2]),
                    mac: [1, 2, 3, 4, 5, 6],
                },
            }
        }
    }

    struct TestCamera {
        fail: bool,
    }

    impl Camera for TestCamera {
        fn status(&self) -> CameraStatus {
            CameraStatus {
                initialized: true,
                psram: false,
                settings: CameraSettings::for_capabilities(&Capabilities::default()),
            }
        }

        fn capture(&mut self) -> Result<Frame, CameraError> {
            if self.fail {
                return Err(CameraError::CaptureFailed);
            }
            Ok(Frame {
                jpeg: vec![0xff, 0xd8, 0xff, 0xd9],
                width: 320,
                height: 240,
            })
        }
    }

    struct Fixture<'a, C> {
        identity: DeviceIdentity,
        guard: AccessGuard,
        gas: GasSensor<M, ScriptedSampler<'a>>,
        camera: AsyncMutex<M, C>,
    }

    impl<'a, C: Camera> Fixture<'a, C> {
        fn new(raw: &'a Cell<u16>, camera: C) -> Self {
            Self {
                identity: DeviceIdentity::default(),
                guard: AccessGuard::new(&AuthConfig {
                    api_key: Some(String::from("key")),
                    ..AuthConfig::default()
                }),
                gas: GasSensor::new(GasSensorConfig::default(), ScriptedSampler { raw }),
                camera: AsyncMutex::new(camera),
            }
        }

        fn send(&self, raw: &str) -> Response {
            self.send_with(raw, &mut NoDelay)
        }

        fn send_with<D: DelayNs>(&self, raw: &str, delay: &mut D) -> Response {
            let ctx = ApiContext {
                identity: &self.identity,
                guard: &self.guard,
                capabilities: Capabilities::default(),
                gas: &self.gas,
                camera: &self.camera,
                system: &FixedSystemInfo,
            };
            let request = Request::parse(raw.as_bytes()).unwrap();
            block_on(handle(&ctx, &request, delay))
        }
    }

    const CALIBRATE: &str =
        "POST /api/gas/calibrate HTTP/1.1\r\nX-API-Key: key\r\nContent-Length: 0\r\n\r\n";

    /// Sends a second calibrate request from inside the first run's sampling
    /// window.
    struct InterleavedDelay<'f, 'a> {
        fixture: &'f Fixture<'a, NoCamera>,
        second: Option<Response>,
    }

    impl DelayNs for InterleavedDelay<'_, '_> {
        async fn delay_ns(&mut self, _ns: u32) {
            if self.second.is_none() {
                assert!(self.fixture.gas.is_calibrating());
                self.second = Some(self.fixture.send(CALIBRATE));
            }
        }
    }

    fn basic_header() -> String {
        alloc::format!("Authorization: Basic {}\r\n", STANDARD.encode("admin:awcms2024"))
    }

    fn body(response: &Response) -> &str {
        core::str::from_utf8(&response.body).unwrap()
    }

    #[test]
    fn test_status_is_public() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send("GET /api/status HTTP/1.1\r\n\r\n");
        assert_eq!(response.status, Status::Ok);
        assert!(body(&response).contains(r#""ip_address":"10.0.0.2""#));
    }

    #[test]
    fn test_guarded_route_challenges() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send("GET /api/gas HTTP/1.1\r\n\r\n");
        assert_eq!(response.status, Status::Unauthorized);
        assert_eq!(body(&response), "Authentication Required");
        assert_eq!(
            response.header("WWW-Authenticate"),
            Some("Basic realm=\"AWCMS IoT\"")
        );
    }

    #[test]
    fn test_gas_with_basic_auth() {
        let raw = Cell::new(2048);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));
        block_on(fixture.gas.poll(7)).unwrap();

        let request = alloc::format!("GET /api/gas HTTP/1.1\r\n{}\r\n", basic_header());
        let response = fixture.send(&request);
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.content_type, "application/json");
        assert!(body(&response).starts_with(r#"{"raw":2048,"#));
        assert!(body(&response).contains(r#""calibrated":false"#));
    }

    #[test]
    fn test_calibrate_with_api_key() {
        let raw = Cell::new(1365);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send(
            "POST /api/gas/calibrate HTTP/1.1\r\nX-API-Key: key\r\nContent-Length: 0\r\n\r\n",
        );
        assert_eq!(response.status, Status::Ok);
        assert!(body(&response).starts_with(r#"{"status":"calibrated","ro":"#));
        assert!(fixture.gas.calibration().is_calibrated());
    }

    #[test]
    fn test_calibrate_while_running_is_busy() {
        let raw = Cell::new(1365);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));
        let mut delay = InterleavedDelay {
            fixture: &fixture,
            second: None,
        };

        let first = fixture.send_with(CALIBRATE, &mut delay);
        assert_eq!(first.status, Status::Ok);
        assert!(body(&first).starts_with(r#"{"status":"calibrated","ro":"#));

        let second = delay.second.expect("second request was sent");
        assert_eq!(second.status, Status::Conflict);
        assert_eq!(second.content_type, "application/json");
        assert_eq!(body(&second), r#"{"status":"busy"}"#);
        assert!(!fixture.gas.is_calibrating());
    }

    #[test]
    fn test_calibrate_failure() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response =
            fixture.send("POST /api/gas/calibrate HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(response.status, Status::Ok);
        assert_eq!(body(&response), r#"{"status":"failed"}"#);
    }

    #[test]
    fn test_capture_without_camera() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send("GET /capture HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(response.status, Status::ServiceUnavailable);
        assert_eq!(body(&response), "Camera not initialized");
    }

    #[test]
    fn test_capture_frame() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, TestCamera { fail: false });

        let response = fixture.send("GET /capture HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.content_type, "image/jpeg");
        assert_eq!(response.body, vec![0xff, 0xd8, 0xff, 0xd9]);
        assert_eq!(
            response.header("Content-Disposition"),
            Some("inline; filename=capture.jpg")
        );
    }

    #[test]
    fn test_capture_failure() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, TestCamera { fail: true });

        let response = fixture.send("GET /capture HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(response.status, Status::InternalServerError);
    }

    #[test]
    fn test_camera_status() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, TestCamera { fail: false });

        let response = fixture.send("GET /api/camera HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(
            body(&response),
            r#"{"initialized":true,"psram":false,"resolution":5,"quality":12}"#
        );
    }

    #[test]
    fn test_restart_sets_action() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send("POST /api/restart HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(body(&response), r#"{"status":"restarting"}"#);
        assert_eq!(response.action, Some(PostAction::Restart));

        let denied = fixture.send("POST /api/restart HTTP/1.1\r\n\r\n");
        assert_eq!(denied.action, None);
    }

    #[test]
    fn test_wifi_info() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        let response = fixture.send("GET /api/wifi HTTP/1.1\r\nX-API-Key: key\r\n\r\n");
        assert_eq!(
            body(&response),
            r#"{"ssid":"lab","rssi":-40,"ip":"10.0.0.2","mac":"01:02:03:04:05:06"}"#
        );
    }

    #[test]
    fn test_unknown_route_and_wrong_method() {
        let raw = Cell::new(0);
        let fixture = Fixture::new(&raw, NoCamera::new(Capabilities::default()));

        assert_eq!(
            fixture.send("GET /nope HTTP/1.1\r\n\r\n").status,
            Status::NotFound
        );
        assert_eq!(
            fixture.send("GET /api/restart HTTP/1.1\r\n\r\n").status,
            Status::NotFound
        );
    }
}
