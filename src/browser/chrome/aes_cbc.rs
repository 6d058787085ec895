//! AES-128-CBC cookie encryption used by Chromium on Linux and macOS.

use crate::error::{ExportError, Result};
use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

pub(super) const KEY_LENGTH: usize = 16;
const KEY_DERIVE_SALT: &[u8] = b"saltysalt";
const AES_IV: &[u8; 16] = b"                ";

pub(super) fn derive_key(password: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha1>(password, KEY_DERIVE_SALT, iterations, &mut key);
    key
}

pub(super) fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LENGTH]) -> Result<Vec<u8>> {
    let mut buffer = ciphertext.to_vec();
    let decryptor = cbc::Decryptor::<Aes128>::new_from_slices(key, AES_IV).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to create AES decryptor: {}", e))
    })?;
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| ExportError::BrowserCookie("Failed to decrypt cookie".to_string()))?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::{decrypt, derive_key, AES_IV, KEY_LENGTH};
    use aes::Aes128;
    use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};

    fn encrypt(plaintext: &[u8], key: &[u8; KEY_LENGTH]) -> Vec<u8> {
        let encryptor = cbc::Encryptor::<Aes128>::new_from_slices(key, AES_IV).expect("cipher");
        let mut buffer = vec![0u8; plaintext.len() + 16];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        encryptor
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
            .expect("encrypt")
            .to_vec()
    }

    #[test]
    fn decrypt_reverses_chromium_encryption() {
        let key = derive_key(b"peanuts", 1);
        let ciphertext = encrypt(b"session-value", &key);
        assert_eq!(decrypt(&ciphertext, &key).expect("plaintext"), b"session-value");
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let ciphertext = encrypt(b"session-value", &derive_key(b"peanuts", 1));
        let other = derive_key(b"", 1);
        let result = decrypt(&ciphertext, &other).ok();
        assert_ne!(result.as_deref(), Some(&b"session-value"[..]));
    }

    #[test]
    fn derive_key_depends_on_iterations() {
        assert_ne!(derive_key(b"peanuts", 1), derive_key(b"peanuts", 1003));
    }
}
