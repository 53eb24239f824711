pub mod errors;

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bech32::{ToBase32, Variant};
use bip39::{Language, Mnemonic, MnemonicType, Seed};
use bitcoin::{
    bip32::{ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey},
    network::constants::Network,
    secp256k1::Secp256k1,
};
use hdpath::StandardHDPath;
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use ripemd::Ripemd160;
use serde_derive::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use errors::Error;

pub const KEYSTORE_DEFAULT_FOLDER: &str = ".veridian/keys/";
pub const KEYSTORE_DISK_BACKEND: &str = "keyring-test";
pub const KEYSTORE_FILE_EXTENSION: &str = "json";

/// [Coin type][coin-type] associated with a key.
///
/// See [the list of all registered coin types][coin-types].
///
/// [coin-type]: https://github.com/bitcoin/bips/blob/master/bip-0044.mediawiki#Coin_type
/// [coin-types]: https://github.com/satoshilabs/slips/blob/master/slip-0044.md
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoinType(u32);

impl CoinType {
    /// Cosmos Hub coin type with number 118, shared by most SDK chains.
    pub const COSMOS: CoinType = CoinType(118);

    pub fn new(coin_type: u32) -> Self {
        Self(coin_type)
    }

    pub fn num(&self) -> u32 {
        self.0
    }
}

impl Default for CoinType {
    fn default() -> Self {
        Self::COSMOS
    }
}

impl FromStr for CoinType {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Self::new)
    }
}

/// Key entry stores the Private Key and Public Key as well the address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Public key
    pub public_key: ExtendedPubKey,

    /// Private key
    pub private_key: ExtendedPrivKey,

    /// Account Bech32 format
    pub account: String,

    /// Address
    pub address: Vec<u8>,

    /// Coin type
    pub coin_type: CoinType,
}

impl KeyEntry {
    /// Compressed SEC1 public key bytes, as carried in a `SignerInfo`.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.public_key.serialize().to_vec()
    }

    /// Sign a message with this key's secp256k1 private key.
    ///
    /// The message is hashed with SHA-256 before signing; the result is the
    /// 64-byte fixed-size encoding of the signature.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        let private_key_bytes = self.private_key.private_key.secret_bytes();
        let signing_key = SigningKey::from_slice(&private_key_bytes).map_err(Error::invalid_key)?;

        let signature: Signature = signing_key.sign(message);
        Ok(signature.to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    pub name: String,
    pub r#type: String,
    pub address: String,
    pub pubkey: String,
    pub mnemonic: String,
    pub coin_type: Option<CoinType>,
}

impl TryFrom<KeyFile> for KeyEntry {
    type Error = Error;

    fn try_from(key_file: KeyFile) -> Result<Self, Self::Error> {
        // Decode the Bech32-encoded address from the key file
        let keyfile_address_bytes = decode_bech32(&key_file.address)?;

        // Decode the Bech32-encoded public key from the key file
        let mut keyfile_pubkey_bytes = decode_bech32(&key_file.pubkey)?;

        // Use coin type if present or the default coin type.
        let coin_type = key_file.coin_type.unwrap_or_default();

        // Decode the private key from the mnemonic
        let private_key = private_key_from_mnemonic(&key_file.mnemonic, coin_type)?;
        let public_key = ExtendedPubKey::from_priv(&Secp256k1::new(), &private_key);
        let public_key_bytes = public_key.public_key.serialize().to_vec();

        if keyfile_pubkey_bytes.len() < public_key_bytes.len() {
            return Err(Error::public_key_mismatch(
                keyfile_pubkey_bytes,
                public_key_bytes,
            ));
        }

        // The public key in the key file carries an amino type prefix:
        // keep only the trailing SEC1 bytes for comparison.
        let keyfile_pubkey_bytes =
            keyfile_pubkey_bytes.split_off(keyfile_pubkey_bytes.len() - public_key_bytes.len());

        // Ensure that the public key in the key file and the one extracted from the mnemonic match.
        if keyfile_pubkey_bytes != public_key_bytes {
            return Err(Error::public_key_mismatch(
                keyfile_pubkey_bytes,
                public_key_bytes,
            ));
        }

        Ok(KeyEntry {
            public_key,
            private_key,
            account: key_file.address,
            address: keyfile_address_bytes,
            coin_type,
        })
    }
}

pub trait KeyStore {
    fn get_key(&self, key_name: &str) -> Result<KeyEntry, Error>;
    fn add_key(&mut self, key_name: &str, key_entry: KeyEntry) -> Result<(), Error>;
    fn remove_key(&mut self, key_name: &str) -> Result<(), Error>;
    fn keys(&self) -> Result<Vec<(String, KeyEntry)>, Error>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Memory {
    account_prefix: String,
    keys: HashMap<String, KeyEntry>,
}

impl Memory {
    pub fn new(account_prefix: String) -> Self {
        Self {
            account_prefix,
            keys: HashMap::new(),
        }
    }
}

impl KeyStore for Memory {
    fn get_key(&self, key_name: &str) -> Result<KeyEntry, Error> {
        self.keys
            .get(key_name)
            .cloned()
            .ok_or_else(|| Error::key_not_found(key_name.to_string()))
    }

    fn add_key(&mut self, key_name: &str, key_entry: KeyEntry) -> Result<(), Error> {
        if self.keys.contains_key(key_name) {
            return Err(Error::existing_key(key_name.to_string()));
        }

        self.keys.insert(key_name.to_string(), key_entry);

        Ok(())
    }

    fn remove_key(&mut self, key_name: &str) -> Result<(), Error> {
        self.keys
            .remove(key_name)
            .ok_or_else(|| Error::key_not_found(key_name.to_string()))?;

        Ok(())
    }

    fn keys(&self) -> Result<Vec<(String, KeyEntry)>, Error> {
        Ok(self
            .keys
            .iter()
            .map(|(n, k)| (n.to_string(), k.clone()))
            .collect())
    }
}

/// On-disk store writing one plaintext JSON file per key, in the manner of
/// the SDK's unencrypted `keyring-test` backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Test {
    account_prefix: String,
    store: PathBuf,
}

impl Test {
    pub fn new(account_prefix: String, store: PathBuf) -> Self {
        Self {
            account_prefix,
            store,
        }
    }
}

impl KeyStore for Test {
    fn get_key(&self, key_name: &str) -> Result<KeyEntry, Error> {
        let mut key_file = self.store.join(key_name);
        key_file.set_extension(KEYSTORE_FILE_EXTENSION);

        if !key_file.as_path().exists() {
            return Err(Error::key_not_found(key_name.to_string()));
        }

        let file = File::open(&key_file).map_err(|e| {
            Error::key_file_io(
                key_file.display().to_string(),
                "failed to open file".to_string(),
                e,
            )
        })?;

        let key_entry = serde_json::from_reader(file)
            .map_err(|e| Error::key_file_decode(key_file.display().to_string(), e))?;

        Ok(key_entry)
    }

    fn add_key(&mut self, key_name: &str, key_entry: KeyEntry) -> Result<(), Error> {
        let mut filename = self.store.join(key_name);
        filename.set_extension(KEYSTORE_FILE_EXTENSION);

        if filename.as_path().exists() {
            return Err(Error::existing_key(key_name.to_string()));
        }

        let file_path = filename.display().to_string();

        let file = File::create(filename).map_err(|e| {
            Error::key_file_io(file_path.clone(), "failed to create file".to_string(), e)
        })?;

        serde_json::to_writer_pretty(file, &key_entry)
            .map_err(|e| Error::key_file_encode(file_path, e))?;

        Ok(())
    }

    fn remove_key(&mut self, key_name: &str) -> Result<(), Error> {
        let mut filename = self.store.join(key_name);
        filename.set_extension(KEYSTORE_FILE_EXTENSION);

        if !filename.as_path().exists() {
            return Err(Error::key_not_found(key_name.to_string()));
        }

        fs::remove_file(&filename).map_err(|e| {
            Error::key_file_io(
                filename.display().to_string(),
                "failed to remove file".to_string(),
                e,
            )
        })?;

        Ok(())
    }

    fn keys(&self) -> Result<Vec<(String, KeyEntry)>, Error> {
        let dir = fs::read_dir(&self.store).map_err(|e| {
            Error::key_file_io(
                self.store.display().to_string(),
                "failed to list keys folder".to_string(),
                e,
            )
        })?;

        let ext = OsStr::new(KEYSTORE_FILE_EXTENSION);

        let mut keys = Vec::new();
        for entry in dir {
            let path = entry
                .map_err(|e| {
                    Error::key_file_io(
                        self.store.display().to_string(),
                        "failed to list keys folder".to_string(),
                        e,
                    )
                })?
                .path();

            if path.extension() != Some(ext) {
                continue;
            }

            if let Some(name) = path.file_stem().and_then(OsStr::to_str) {
                let key = self.get_key(name)?;
                keys.push((name.to_string(), key));
            }
        }

        Ok(keys)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Store {
    Memory,
    Test,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KeyRing {
    Memory(Memory),
    Test(Test),
}

impl KeyRing {
    pub fn new(store: Store, account_prefix: &str, chain_id: &str) -> Result<Self, Error> {
        match store {
            Store::Memory => Ok(Self::Memory(Memory::new(account_prefix.to_string()))),

            Store::Test => {
                let keys_folder = disk_store_path(chain_id)?;

                // Create keys folder if it does not exist
                fs::create_dir_all(&keys_folder).map_err(|e| {
                    Error::key_store(format!(
                        "failed to create keys folder {}: {}",
                        keys_folder.display(),
                        e
                    ))
                })?;

                Ok(Self::Test(Test::new(
                    account_prefix.to_string(),
                    keys_folder,
                )))
            }
        }
    }

    pub fn get_key(&self, key_name: &str) -> Result<KeyEntry, Error> {
        match self {
            KeyRing::Memory(m) => m.get_key(key_name),
            KeyRing::Test(d) => d.get_key(key_name),
        }
    }

    pub fn add_key(&mut self, key_name: &str, key_entry: KeyEntry) -> Result<(), Error> {
        match self {
            KeyRing::Memory(m) => m.add_key(key_name, key_entry),
            KeyRing::Test(d) => d.add_key(key_name, key_entry),
        }
    }

    pub fn remove_key(&mut self, key_name: &str) -> Result<(), Error> {
        match self {
            KeyRing::Memory(m) => m.remove_key(key_name),
            KeyRing::Test(d) => d.remove_key(key_name),
        }
    }

    pub fn keys(&self) -> Result<Vec<(String, KeyEntry)>, Error> {
        match self {
            KeyRing::Memory(m) => m.keys(),
            KeyRing::Test(d) => d.keys(),
        }
    }

    /// Find the key whose bech32 account matches the given address.
    pub fn key_by_account(&self, account: &str) -> Result<KeyEntry, Error> {
        self.keys()?
            .into_iter()
            .map(|(_, key)| key)
            .find(|key| key.account == account)
            .ok_or_else(|| Error::account_not_found(account.to_string()))
    }

    /// Create a fresh 24-word key, store it under `key_name` and hand back
    /// the entry together with the mnemonic backing it.
    pub fn generate_key(
        &mut self,
        key_name: &str,
        coin_type: CoinType,
    ) -> Result<(KeyEntry, String), Error> {
        let mnemonic = Mnemonic::new(MnemonicType::Words24, Language::English);
        let phrase = mnemonic.phrase().to_string();

        let key = self.key_from_mnemonic(&phrase, coin_type)?;
        self.add_key(key_name, key.clone())?;

        Ok((key, phrase))
    }

    /// Rebuild a key from an existing mnemonic and store it under `key_name`.
    pub fn recover_key(
        &mut self,
        key_name: &str,
        mnemonic_words: &str,
        coin_type: CoinType,
    ) -> Result<KeyEntry, Error> {
        let key = self.key_from_mnemonic(mnemonic_words, coin_type)?;
        self.add_key(key_name, key.clone())?;

        Ok(key)
    }

    /// Get key from seed file
    pub fn key_from_seed_file(&self, key_file_content: &str) -> Result<KeyEntry, Error> {
        let key_file: KeyFile = serde_json::from_str(key_file_content)
            .map_err(|e| Error::key_file_decode("seed file".to_string(), e))?;

        key_file.try_into()
    }

    /// Derive a key entry from a mnemonic, without storing it.
    pub fn key_from_mnemonic(
        &self,
        mnemonic_words: &str,
        coin_type: CoinType,
    ) -> Result<KeyEntry, Error> {
        // Get the private key from the mnemonic
        let private_key = private_key_from_mnemonic(mnemonic_words, coin_type)?;

        // Get the public Key from the private key
        let public_key = ExtendedPubKey::from_priv(&Secp256k1::new(), &private_key);

        // Get address from the public Key
        let address = get_address(&public_key);

        // Compute Bech32 account
        let account = bech32::encode(self.account_prefix(), address.to_base32(), Variant::Bech32)
            .map_err(Error::bech32_account)?;

        Ok(KeyEntry {
            public_key,
            private_key,
            account,
            address,
            coin_type,
        })
    }

    /// Sign a message with the named key.
    pub fn sign_msg(&self, key_name: &str, msg: &[u8]) -> Result<Vec<u8>, Error> {
        let key = self.get_key(key_name)?;
        key.sign(msg)
    }

    pub fn account_prefix(&self) -> &str {
        match self {
            KeyRing::Memory(m) => &m.account_prefix,
            KeyRing::Test(d) => &d.account_prefix,
        }
    }
}

/// Decode an extended private key from a mnemonic
fn private_key_from_mnemonic(
    mnemonic_words: &str,
    coin_type: CoinType,
) -> Result<ExtendedPrivKey, Error> {
    let mnemonic = Mnemonic::from_phrase(mnemonic_words, Language::English)
        .map_err(Error::invalid_mnemonic)?;

    let seed = Seed::new(&mnemonic, "");

    // Get Private Key from seed and standard derivation path
    let hd_path_format = format!("m/44'/{}'/0'/0/0", coin_type.num());
    let hd_path = StandardHDPath::try_from(hd_path_format.as_str())
        .map_err(|_| Error::invalid_hd_path(hd_path_format))?;

    let private_key = ExtendedPrivKey::new_master(Network::Bitcoin, seed.as_bytes())
        .and_then(|k| {
            k.derive_priv(
                &Secp256k1::new(),
                &standard_path_to_derivation_path(&hd_path),
            )
        })
        .map_err(Error::private_key)?;

    Ok(private_key)
}

fn standard_path_to_derivation_path(path: &StandardHDPath) -> DerivationPath {
    let child_numbers = vec![
        ChildNumber::from_hardened_idx(path.purpose().as_value().as_number())
            .expect("Purpose is not Hardened"),
        ChildNumber::from_hardened_idx(path.coin_type()).expect("Coin Type is not Hardened"),
        ChildNumber::from_hardened_idx(path.account()).expect("Account is not Hardened"),
        ChildNumber::from_normal_idx(path.change()).expect("Change is Hardened"),
        ChildNumber::from_normal_idx(path.index()).expect("Index is Hardened"),
    ];

    DerivationPath::from(child_numbers)
}

/// Return an address from a Public Key
fn get_address(pk: &ExtendedPubKey) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(pk.public_key.serialize());

    // Read hash digest over the public key bytes & consume hasher
    let pk_hash = hasher.finalize();

    // Plug the hash result into the next crypto hash function.
    let mut rip_hasher = Ripemd160::new();
    rip_hasher.update(pk_hash);
    let rip_result = rip_hasher.finalize();

    rip_result.to_vec()
}

fn decode_bech32(input: &str) -> Result<Vec<u8>, Error> {
    use bech32::FromBase32;

    let bytes = bech32::decode(input)
        .and_then(|(_, data, _)| Vec::from_base32(&data))
        .map_err(Error::bech32)?;

    Ok(bytes)
}

fn disk_store_path(folder_name: &str) -> Result<PathBuf, Error> {
    let home = dirs_next::home_dir()
        .ok_or_else(|| Error::key_store("cannot retrieve home folder location".to_string()))?;

    let folder = Path::new(home.as_path())
        .join(KEYSTORE_DEFAULT_FOLDER)
        .join(folder_name)
        .join(KEYSTORE_DISK_BACKEND);

    Ok(folder)
}
