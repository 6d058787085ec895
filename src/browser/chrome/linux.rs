use super::aes_cbc::{self, KEY_LENGTH};
use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::error::{ExportError, Result};
use dirs::{config_dir, home_dir};
use secret_service::{EncryptionType, SecretService};
use std::env;
use std::process::Command;
use std::str::FromStr;

const KEY_DERIVE_ITERATIONS: u32 = 1;
const LINUX_V10_PASSWORD: &[u8] = b"peanuts";

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let config_home = config_dir().or_else(|| home_dir().map(|home| home.join(".config")));
    let config_home = config_home
        .ok_or_else(|| ExportError::Config("Cannot determine config directory".to_string()))?;
    let (relative_dir, keyring_name, supports_profiles) = match browser {
        ChromiumBrowser::Chrome => ("google-chrome", "Chrome", true),
        ChromiumBrowser::Chromium => ("chromium", "Chromium", true),
        ChromiumBrowser::Edge => ("microsoft-edge", "Chromium", true),
        ChromiumBrowser::Brave => ("BraveSoftware/Brave-Browser", "Brave", true),
        ChromiumBrowser::Opera => ("opera", "Chromium", false),
        ChromiumBrowser::Vivaldi => ("vivaldi", "Chrome", true),
        ChromiumBrowser::Whale => ("naver-whale", "Whale", true),
    };
    Ok(ChromiumSettings {
        user_data_dir: config_home.join(relative_dir),
        keyring_name,
        supports_profiles,
    })
}

pub(super) struct LinuxChromeCookieDecryptor {
    v10_key: [u8; KEY_LENGTH],
    empty_key: [u8; KEY_LENGTH],
    v11_key: Option<[u8; KEY_LENGTH]>,
    meta_version: i64,
}

impl LinuxChromeCookieDecryptor {
    pub(super) fn new(
        settings: &ChromiumSettings,
        meta_version: i64,
        keyring: Option<&str>,
    ) -> Result<Self> {
        let keyring = match keyring {
            Some(keyring) => keyring.parse::<LinuxKeyring>()?,
            None => choose_linux_keyring(&|key| env::var(key).ok()),
        };
        log::debug!("Using Linux keyring {:?}", keyring);
        let password = keyring_password(settings.keyring_name, keyring);

        Ok(Self {
            v10_key: aes_cbc::derive_key(LINUX_V10_PASSWORD, KEY_DERIVE_ITERATIONS),
            empty_key: aes_cbc::derive_key(b"", KEY_DERIVE_ITERATIONS),
            v11_key: password.map(|password| aes_cbc::derive_key(&password, KEY_DERIVE_ITERATIONS)),
            meta_version,
        })
    }

    fn decrypt_with(&self, ciphertext: &[u8], keys: [&[u8; KEY_LENGTH]; 2]) -> Option<String> {
        for key in keys {
            let Ok(plaintext) = aes_cbc::decrypt(ciphertext, key) else {
                continue;
            };
            if let Some(value) = decode_cookie_value(&plaintext, self.meta_version) {
                return Some(value);
            }
        }
        log::warn!("Failed to decrypt Chrome cookie: no key produced valid UTF-8");
        None
    }
}

impl CookieDecryptor for LinuxChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        match version {
            b"v10" => self.decrypt_with(ciphertext, [&self.v10_key, &self.empty_key]),
            b"v11" => {
                let v11_key = self.v11_key.as_ref()?;
                self.decrypt_with(ciphertext, [v11_key, &self.empty_key])
            }
            _ => {
                log::warn!("Unknown Chrome cookie version: {:?}", version);
                None
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinuxDesktopEnvironment {
    Other,
    Cinnamon,
    Deepin,
    Gnome,
    Kde3,
    Kde4,
    Kde5,
    Kde6,
    Pantheon,
    Ukui,
    Unity,
    Xfce,
    Lxqt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinuxKeyring {
    KWallet,
    KWallet5,
    KWallet6,
    GnomeKeyring,
    BasicText,
}

impl FromStr for LinuxKeyring {
    type Err = ExportError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "kwallet" => Ok(LinuxKeyring::KWallet),
            "kwallet5" => Ok(LinuxKeyring::KWallet5),
            "kwallet6" => Ok(LinuxKeyring::KWallet6),
            "gnome" | "gnomekeyring" => Ok(LinuxKeyring::GnomeKeyring),
            "basic" | "basictext" => Ok(LinuxKeyring::BasicText),
            _ => Err(ExportError::Config(format!("Unsupported keyring: {}", value))),
        }
    }
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn desktop_environment(env: EnvLookup<'_>) -> LinuxDesktopEnvironment {
    let desktop_session = env("DESKTOP_SESSION").unwrap_or_default();
    let kde_version = env("KDE_SESSION_VERSION");

    if let Some(xdg_current_desktop) = env("XDG_CURRENT_DESKTOP") {
        for part in xdg_current_desktop.split(':').map(str::trim) {
            match part {
                "Unity" if desktop_session.contains("gnome-fallback") => {
                    return LinuxDesktopEnvironment::Gnome
                }
                "Unity" => return LinuxDesktopEnvironment::Unity,
                "Deepin" => return LinuxDesktopEnvironment::Deepin,
                "GNOME" => return LinuxDesktopEnvironment::Gnome,
                "X-Cinnamon" => return LinuxDesktopEnvironment::Cinnamon,
                "KDE" => {
                    return match kde_version.as_deref() {
                        Some("5") => LinuxDesktopEnvironment::Kde5,
                        Some("6") => LinuxDesktopEnvironment::Kde6,
                        _ => LinuxDesktopEnvironment::Kde4,
                    }
                }
                "Pantheon" => return LinuxDesktopEnvironment::Pantheon,
                "XFCE" => return LinuxDesktopEnvironment::Xfce,
                "UKUI" => return LinuxDesktopEnvironment::Ukui,
                "LXQt" => return LinuxDesktopEnvironment::Lxqt,
                _ => {}
            }
        }
    }

    match desktop_session.as_str() {
        "deepin" => return LinuxDesktopEnvironment::Deepin,
        "mate" | "gnome" => return LinuxDesktopEnvironment::Gnome,
        "kde4" | "kde-plasma" => return LinuxDesktopEnvironment::Kde4,
        "kde" if kde_version.is_some() => return LinuxDesktopEnvironment::Kde4,
        "kde" => return LinuxDesktopEnvironment::Kde3,
        "ukui" => return LinuxDesktopEnvironment::Ukui,
        _ => {}
    }

    if desktop_session.contains("xfce") || desktop_session == "xubuntu" {
        return LinuxDesktopEnvironment::Xfce;
    }
    if env("GNOME_DESKTOP_SESSION_ID").is_some() {
        return LinuxDesktopEnvironment::Gnome;
    }
    if env("KDE_FULL_SESSION").is_some() {
        return if kde_version.is_some() {
            LinuxDesktopEnvironment::Kde4
        } else {
            LinuxDesktopEnvironment::Kde3
        };
    }

    LinuxDesktopEnvironment::Other
}

fn choose_linux_keyring(env: EnvLookup<'_>) -> LinuxKeyring {
    match desktop_environment(env) {
        LinuxDesktopEnvironment::Kde4 => LinuxKeyring::KWallet,
        LinuxDesktopEnvironment::Kde5 => LinuxKeyring::KWallet5,
        LinuxDesktopEnvironment::Kde6 => LinuxKeyring::KWallet6,
        LinuxDesktopEnvironment::Kde3
        | LinuxDesktopEnvironment::Lxqt
        | LinuxDesktopEnvironment::Other => LinuxKeyring::BasicText,
        _ => LinuxKeyring::GnomeKeyring,
    }
}

/// `None` means the browser stores cookies with the fixed v10 password only.
fn keyring_password(browser_keyring_name: &str, keyring: LinuxKeyring) -> Option<Vec<u8>> {
    match keyring {
        LinuxKeyring::KWallet | LinuxKeyring::KWallet5 | LinuxKeyring::KWallet6 => {
            Some(kwallet_password(browser_keyring_name, keyring))
        }
        LinuxKeyring::GnomeKeyring => Some(gnome_keyring_password(browser_keyring_name)),
        LinuxKeyring::BasicText => None,
    }
}

fn kwallet_password(browser_keyring_name: &str, keyring: LinuxKeyring) -> Vec<u8> {
    let network_wallet = kwallet_network_wallet(keyring);
    let output = Command::new("kwallet-query")
        .args([
            "--read-password",
            &format!("{} Safe Storage", browser_keyring_name),
            "--folder",
            &format!("{} Keys", browser_keyring_name),
            &network_wallet,
        ])
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            log::warn!("kwallet-query command failed: {}", err);
            return Vec::new();
        }
    };
    if !output.status.success() {
        log::warn!(
            "kwallet-query failed with status {}",
            output.status.code().unwrap_or(-1)
        );
        return Vec::new();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.to_lowercase().starts_with("failed to read") {
        log::debug!("Failed to read password from kwallet");
        return Vec::new();
    }
    stdout.trim_end_matches('\n').as_bytes().to_vec()
}

fn kwallet_network_wallet(keyring: LinuxKeyring) -> String {
    const DEFAULT_WALLET: &str = "kdewallet";
    let (service_name, wallet_path) = match keyring {
        LinuxKeyring::KWallet => ("org.kde.kwalletd", "/modules/kwalletd"),
        LinuxKeyring::KWallet5 => ("org.kde.kwalletd5", "/modules/kwalletd5"),
        LinuxKeyring::KWallet6 => ("org.kde.kwalletd6", "/modules/kwalletd6"),
        _ => return DEFAULT_WALLET.to_string(),
    };

    let output = Command::new("dbus-send")
        .args([
            "--session",
            "--print-reply=literal",
            &format!("--dest={}", service_name),
            wallet_path,
            "org.kde.KWallet.networkWallet",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            parse_dbus_string_reply(&String::from_utf8_lossy(&output.stdout))
                .unwrap_or_else(|| DEFAULT_WALLET.to_string())
        }
        Ok(output) => {
            log::warn!(
                "dbus-send failed with status {}",
                output.status.code().unwrap_or(-1)
            );
            DEFAULT_WALLET.to_string()
        }
        Err(err) => {
            log::warn!("dbus-send failed: {}", err);
            DEFAULT_WALLET.to_string()
        }
    }
}

fn parse_dbus_string_reply(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let start = line.find("string \"")?;
        let rest = &line[start + "string \"".len()..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })
}

fn gnome_keyring_password(browser_keyring_name: &str) -> Vec<u8> {
    // secret-service is built for tokio; extraction runs off any runtime
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::warn!("Failed to start runtime for secret service: {}", err);
            return Vec::new();
        }
    };
    runtime.block_on(read_secret_service_password(browser_keyring_name))
}

async fn read_secret_service_password(browser_keyring_name: &str) -> Vec<u8> {
    let service = match SecretService::connect(EncryptionType::Dh).await {
        Ok(service) => service,
        Err(err) => {
            log::warn!("Failed to connect to secret service: {}", err);
            return Vec::new();
        }
    };

    let collection = match service.get_default_collection().await {
        Ok(collection) => Ok(collection),
        Err(_) => service.get_any_collection().await,
    };
    let collection = match collection {
        Ok(collection) => collection,
        Err(err) => {
            log::warn!("Failed to read keyring collection: {}", err);
            return Vec::new();
        }
    };

    let items = match collection.get_all_items().await {
        Ok(items) => items,
        Err(err) => {
            log::warn!("Failed to read keyring items: {}", err);
            return Vec::new();
        }
    };

    let label = format!("{} Safe Storage", browser_keyring_name);
    for item in items {
        if item.get_label().await.unwrap_or_default() != label {
            continue;
        }
        if item.is_locked().await.unwrap_or(false) {
            if let Err(err) = item.unlock().await {
                log::warn!("Failed to unlock keyring item: {}", err);
            }
        }
        return match item.get_secret().await {
            Ok(secret) => secret,
            Err(err) => {
                log::warn!("Failed to read keyring secret: {}", err);
                Vec::new()
            }
        };
    }

    log::warn!("No '{}' entry in the keyring", label);
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::{
        choose_linux_keyring, desktop_environment, parse_dbus_string_reply,
        LinuxDesktopEnvironment, LinuxKeyring,
    };
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn desktop_environment_reads_xdg_current_desktop() {
        let env = env_of(&[("XDG_CURRENT_DESKTOP", "ubuntu:GNOME")]);
        assert_eq!(desktop_environment(&env), LinuxDesktopEnvironment::Gnome);

        let env = env_of(&[("XDG_CURRENT_DESKTOP", "KDE"), ("KDE_SESSION_VERSION", "6")]);
        assert_eq!(desktop_environment(&env), LinuxDesktopEnvironment::Kde6);

        let env = env_of(&[
            ("XDG_CURRENT_DESKTOP", "Unity"),
            ("DESKTOP_SESSION", "gnome-fallback"),
        ]);
        assert_eq!(desktop_environment(&env), LinuxDesktopEnvironment::Gnome);
    }

    #[test]
    fn desktop_environment_falls_back_to_session() {
        let env = env_of(&[("DESKTOP_SESSION", "xubuntu")]);
        assert_eq!(desktop_environment(&env), LinuxDesktopEnvironment::Xfce);
        let env = env_of(&[("DESKTOP_SESSION", "kde")]);
        assert_eq!(desktop_environment(&env), LinuxDesktopEnvironment::Kde3);
        assert_eq!(desktop_environment(&env_of(&[])), LinuxDesktopEnvironment::Other);
    }

    #[test]
    fn keyring_choice_follows_desktop() {
        let env = env_of(&[("XDG_CURRENT_DESKTOP", "KDE"), ("KDE_SESSION_VERSION", "5")]);
        assert_eq!(choose_linux_keyring(&env), LinuxKeyring::KWallet5);
        let env = env_of(&[("XDG_CURRENT_DESKTOP", "X-Cinnamon")]);
        assert_eq!(choose_linux_keyring(&env), LinuxKeyring::GnomeKeyring);
        assert_eq!(choose_linux_keyring(&env_of(&[])), LinuxKeyring::BasicText);
    }

    #[test]
    fn keyring_names_parse() {
        assert_eq!("GNOMEKEYRING".parse::<LinuxKeyring>().ok(), Some(LinuxKeyring::GnomeKeyring));
        assert_eq!("basic".parse::<LinuxKeyring>().ok(), Some(LinuxKeyring::BasicText));
        assert!("pass".parse::<LinuxKeyring>().is_err());
    }

    #[test]
    fn dbus_reply_yields_wallet_name() {
        let reply = "method return time=1 sender=:1.2\n   string \"kdewallet-2\"\n";
        assert_eq!(parse_dbus_string_reply(reply), Some("kdewallet-2".to_string()));
        assert_eq!(parse_dbus_string_reply("nothing"), None);
    }
}
