use super::aes_cbc::{self, KEY_LENGTH};
use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::error::{ExportError, Result};
use dirs::home_dir;
use security_framework::passwords::get_generic_password;

const KEY_DERIVE_ITERATIONS: u32 = 1003;

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let home = home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    let app_support = home.join("Library/Application Support");
    let (relative_dir, keyring_name, supports_profiles) = match browser {
        ChromiumBrowser::Chrome => ("Google/Chrome", "Chrome", true),
        ChromiumBrowser::Chromium => ("Chromium", "Chromium", true),
        ChromiumBrowser::Edge => ("Microsoft Edge", "Microsoft Edge", true),
        ChromiumBrowser::Brave => ("BraveSoftware/Brave-Browser", "Brave", true),
        ChromiumBrowser::Opera => ("com.operasoftware.Opera", "Opera", false),
        ChromiumBrowser::Vivaldi => ("Vivaldi", "Vivaldi", true),
        ChromiumBrowser::Whale => ("Naver/Whale", "Whale", true),
    };
    Ok(ChromiumSettings {
        user_data_dir: app_support.join(relative_dir),
        keyring_name,
        supports_profiles,
    })
}

pub(super) struct MacChromeCookieDecryptor {
    key: Option<[u8; KEY_LENGTH]>,
    meta_version: i64,
}

impl MacChromeCookieDecryptor {
    pub(super) fn new(settings: &ChromiumSettings, meta_version: i64) -> Result<Self> {
        let service = format!("{} Safe Storage", settings.keyring_name);
        let key = match get_generic_password(&service, settings.keyring_name) {
            Ok(password) => Some(aes_cbc::derive_key(&password, KEY_DERIVE_ITERATIONS)),
            Err(err) => {
                log::warn!(
                    "Failed to read keychain password for {}: {}",
                    settings.keyring_name,
                    err
                );
                None
            }
        };
        Ok(Self { key, meta_version })
    }
}

impl CookieDecryptor for MacChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        if version == b"v10" {
            let key = self.key.as_ref()?;
            let plaintext = aes_cbc::decrypt(ciphertext, key).ok()?;
            decode_cookie_value(&plaintext, self.meta_version)
        } else {
            // Pre-v10 values are stored unencrypted
            String::from_utf8(encrypted_value.to_vec()).ok()
        }
    }
}
