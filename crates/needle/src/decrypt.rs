use std::fmt;

use aes::cipher::{
    block_padding::{NoPadding, Padding, Pkcs7, UnpadError},
    consts::U16,
    BlockDecryptMut, KeyIvInit,
};
use serde::{Deserialize, Serialize};

use crate::error::{NeedleError, NeedleResult};

pub const BLOCK_SIZE: usize = 16;

/// How trailing padding is removed after CBC decryption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Drop as many bytes as the value of the last byte, without looking at the others.
    #[default]
    Lenient,
    /// PKCS#7: every padding byte must equal the padding length.
    Strict,
}

/// Symmetric key and IV shared by every segment of one stream.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamKey {
    key: Vec<u8>,
    iv: [u8; 16],
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamKey")
            .field("key", &format_args!("<{} bytes>", self.key.len()))
            .field("iv", &hex::encode(self.iv))
            .finish()
    }
}

impl StreamKey {
    /// Accepts 16, 24 or 32 byte keys, selecting AES-128, AES-192 or AES-256.
    pub fn new(key: Vec<u8>, iv: [u8; 16]) -> NeedleResult<Self> {
        match key.len() {
            16 | 24 | 32 => Ok(Self { key, iv }),
            len => Err(NeedleError::InvalidKeyLength(len)),
        }
    }

    pub fn from_hex(key: &str, iv: [u8; 16]) -> NeedleResult<Self> {
        Self::new(hex::decode(key.trim())?, iv)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    pub fn to_decryptor(&self) -> NeedleResult<SegmentDecryptor> {
        let invalid = |_| NeedleError::InvalidKeyLength(self.key.len());
        Ok(match self.key.len() {
            16 => SegmentDecryptor::Aes128(
                cbc::Decryptor::<aes::Aes128>::new_from_slices(&self.key, &self.iv)
                    .map_err(invalid)?,
            ),
            24 => SegmentDecryptor::Aes192(
                cbc::Decryptor::<aes::Aes192>::new_from_slices(&self.key, &self.iv)
                    .map_err(invalid)?,
            ),
            32 => SegmentDecryptor::Aes256(
                cbc::Decryptor::<aes::Aes256>::new_from_slices(&self.key, &self.iv)
                    .map_err(invalid)?,
            ),
            len => return Err(NeedleError::InvalidKeyLength(len)),
        })
    }

    /// Decrypts one whole segment. CBC state is not carried between segments.
    pub fn decrypt(&self, segment: Vec<u8>, padding: PaddingMode) -> NeedleResult<Vec<u8>> {
        self.to_decryptor()?.decrypt(segment, padding)
    }
}

pub enum SegmentDecryptor {
    Aes128(cbc::Decryptor<aes::Aes128>),
    Aes192(cbc::Decryptor<aes::Aes192>),
    Aes256(cbc::Decryptor<aes::Aes256>),
}

impl SegmentDecryptor {
    pub fn decrypt(self, mut data: Vec<u8>, padding: PaddingMode) -> NeedleResult<Vec<u8>> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(NeedleError::InvalidCiphertextLength(data.len()));
        }

        match padding {
            PaddingMode::Strict => {
                let len = self.decrypt_in_place::<Pkcs7>(&mut data)?;
                data.truncate(len);
            }
            PaddingMode::Lenient => {
                self.decrypt_in_place::<NoPadding>(&mut data)?;
                strip_padding(&mut data)?;
            }
        }
        Ok(data)
    }

    fn decrypt_in_place<P>(self, data: &mut [u8]) -> Result<usize, UnpadError>
    where
        P: Padding<U16>,
    {
        match self {
            SegmentDecryptor::Aes128(d) => d.decrypt_padded_mut::<P>(data).map(|p| p.len()),
            SegmentDecryptor::Aes192(d) => d.decrypt_padded_mut::<P>(data).map(|p| p.len()),
            SegmentDecryptor::Aes256(d) => d.decrypt_padded_mut::<P>(data).map(|p| p.len()),
        }
    }
}

/// Truncates `data` by the value of its last byte.
///
/// The remaining padding bytes are not checked, see [`PaddingMode::Strict`] for that.
pub fn strip_padding(data: &mut Vec<u8>) -> NeedleResult<()> {
    let Some(&padding) = data.last() else {
        return Ok(());
    };
    let len = data.len();
    if padding as usize > len {
        return Err(NeedleError::InvalidPadding { padding, len });
    }
    data.truncate(len - padding as usize);
    Ok(())
}
