//! Bakes device settings from `.env` (or the build environment) into the
//! firmware image as `AWCMS_*` compile-time variables.

const SETTINGS: &[&str] = &[
    "AWCMS_DEVICE_ID",
    "AWCMS_DEVICE_NAME",
    "AWCMS_WIFI_SSID",
    "AWCMS_WIFI_PASSWORD",
    "AWCMS_WIFI_TIMEOUT_MS",
    "AWCMS_AUTH_ENABLED",
    "AWCMS_AUTH_USERNAME",
    "AWCMS_AUTH_PASSWORD",
    "AWCMS_API_KEY",
    "AWCMS_SENSOR_FAMILY",
    "AWCMS_HTTP_PORT",
    "AWCMS_DEBUG",
    "AWCMS_PSRAM",
];

fn main() {
    // A missing .env is fine, values then come from the environment or defaults
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in SETTINGS {
        println!("cargo:rerun-if-env-changed={}", key);
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
