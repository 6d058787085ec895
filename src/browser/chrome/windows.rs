use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::browser::{find_files, map_cookie_io_error, newest_path};
use crate::error::{ExportError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dirs::home_dir;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use winapi::um::dpapi::CryptUnprotectData;
use winapi::um::winbase::LocalFree;
use winapi::um::wincrypt::DATA_BLOB;

const WINDOWS_V10_PREFIX: &[u8] = b"v10";
const WINDOWS_DPAPI_PREFIX: &[u8] = b"DPAPI";
const AES_GCM_NONCE_LEN: usize = 12;
const AES_GCM_TAG_LEN: usize = 16;

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let home = home_dir();
    let local_root = env::var("LOCALAPPDATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| home.as_ref().map(|home| home.join("AppData/Local")))
        .ok_or_else(|| ExportError::Config("Cannot determine LOCALAPPDATA".to_string()))?;
    let roaming_root = env::var("APPDATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| home.as_ref().map(|home| home.join("AppData/Roaming")))
        .ok_or_else(|| ExportError::Config("Cannot determine APPDATA".to_string()))?;

    let user_data_dir = match browser {
        ChromiumBrowser::Chrome => local_root.join("Google/Chrome/User Data"),
        ChromiumBrowser::Chromium => local_root.join("Chromium/User Data"),
        ChromiumBrowser::Edge => local_root.join("Microsoft/Edge/User Data"),
        ChromiumBrowser::Brave => local_root.join("BraveSoftware/Brave-Browser/User Data"),
        ChromiumBrowser::Opera => roaming_root.join("Opera Software/Opera Stable"),
        ChromiumBrowser::Vivaldi => local_root.join("Vivaldi/User Data"),
        ChromiumBrowser::Whale => local_root.join("Naver/Naver Whale/User Data"),
    };

    Ok(ChromiumSettings {
        user_data_dir,
        keyring_name: "",
        supports_profiles: !matches!(browser, ChromiumBrowser::Opera),
    })
}

pub(super) struct WindowsChromeCookieDecryptor {
    v10_key: Option<Vec<u8>>,
    meta_version: i64,
}

impl WindowsChromeCookieDecryptor {
    pub(super) fn new(settings: &ChromiumSettings, meta_version: i64) -> Result<Self> {
        Ok(Self {
            v10_key: read_v10_key(&settings.user_data_dir)?,
            meta_version,
        })
    }
}

impl CookieDecryptor for WindowsChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        let plaintext = if version == WINDOWS_V10_PREFIX {
            let key = self.v10_key.as_ref()?;
            decrypt_aes_gcm(ciphertext, key).ok()?
        } else {
            decrypt_dpapi(encrypted_value).ok()?
        };
        decode_cookie_value(&plaintext, self.meta_version)
    }
}

/// AES key for v10 values, stored DPAPI-wrapped in `Local State`.
fn read_v10_key(browser_root: &Path) -> Result<Option<Vec<u8>>> {
    let local_state_path = match newest_path(find_files(browser_root, "Local State")) {
        Some(path) => path,
        None => {
            log::warn!("No Local State file under {:?}", browser_root);
            return Ok(None);
        }
    };
    let data = fs::read_to_string(&local_state_path).map_err(|e| {
        map_cookie_io_error(
            "Failed to read Local State",
            &local_state_path,
            e,
            Some("Close the browser or run without elevation."),
        )
    })?;
    let json: serde_json::Value = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Local State is not valid JSON: {}", err);
            return Ok(None);
        }
    };
    let encrypted_bytes = json
        .pointer("/os_crypt/encrypted_key")
        .and_then(|value| value.as_str())
        .and_then(|key| STANDARD.decode(key).ok());
    let encrypted_bytes = match encrypted_bytes {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    match encrypted_bytes.strip_prefix(WINDOWS_DPAPI_PREFIX) {
        Some(wrapped) => Ok(decrypt_dpapi(wrapped).ok()),
        None => {
            log::warn!("Invalid DPAPI prefix in Local State");
            Ok(None)
        }
    }
}

fn decrypt_aes_gcm(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(ExportError::BrowserCookie(
            "Invalid AES-GCM key length".to_string(),
        ));
    }
    if ciphertext.len() < AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN {
        return Err(ExportError::BrowserCookie(
            "Invalid AES-GCM ciphertext length".to_string(),
        ));
    }
    let (nonce_bytes, payload) = ciphertext.split_at(AES_GCM_NONCE_LEN);
    let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to create AES-GCM cipher: {}", e))
    })?;
    cipher
        .decrypt(nonce, payload)
        .map_err(|_| ExportError::BrowserCookie("Failed to decrypt cookie".to_string()))
}

fn decrypt_dpapi(ciphertext: &[u8]) -> Result<Vec<u8>> {
    // SAFETY: `in_blob` borrows `ciphertext` for the duration of the call and
    // `out_blob` is allocated by the system and released with LocalFree.
    unsafe {
        let mut in_blob = DATA_BLOB {
            cbData: ciphertext.len() as u32,
            pbData: ciphertext.as_ptr() as *mut u8,
        };
        let mut out_blob = DATA_BLOB {
            cbData: 0,
            pbData: std::ptr::null_mut(),
        };

        let result = CryptUnprotectData(
            &mut in_blob,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
            &mut out_blob,
        );
        if result == 0 {
            return Err(ExportError::BrowserCookie(
                "Failed to decrypt with DPAPI".to_string(),
            ));
        }

        let data = std::slice::from_raw_parts(out_blob.pbData, out_blob.cbData as usize).to_vec();
        LocalFree(out_blob.pbData as *mut _);
        Ok(data)
    }
}
