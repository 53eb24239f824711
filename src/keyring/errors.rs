use flex_error::{define_error, TraceError};

define_error! {
    Error {
        KeyNotFound
            { name: String }
            |e| { format!("key '{}' not found in keyring", e.name) },

        ExistingKey
            { name: String }
            |e| { format!("a key named '{}' already exists in the keyring", e.name) },

        AccountNotFound
            { account: String }
            |e| { format!("no key in the keyring matches account {}", e.account) },

        InvalidMnemonic
            [ TraceError<anyhow::Error> ]
            |_| { "invalid mnemonic" },

        InvalidHdPath
            { path: String }
            |e| { format!("invalid HD derivation path: {}", e.path) },

        PrivateKey
            [ TraceError<bitcoin::bip32::Error> ]
            |_| { "cannot generate private key" },

        InvalidKey
            [ TraceError<k256::ecdsa::Error> ]
            |_| { "cannot build a signing key from the stored private key" },

        Bech32
            [ TraceError<bech32::Error> ]
            |_| { "bech32 decoding failed" },

        Bech32Account
            [ TraceError<bech32::Error> ]
            |_| { "cannot generate bech32 account" },

        PublicKeyMismatch
            { keyfile: Vec<u8>, mnemonic: Vec<u8> }
            |_| { "public key in the key file does not match the one derived from the mnemonic" },

        KeyFileEncode
            { file_path: String }
            [ TraceError<serde_json::Error> ]
            |e| { format!("error encoding key file at '{}'", e.file_path) },

        KeyFileDecode
            { file_path: String }
            [ TraceError<serde_json::Error> ]
            |e| { format!("error decoding key file at '{}'", e.file_path) },

        KeyFileIo
            { file_path: String, description: String }
            [ TraceError<std::io::Error> ]
            |e| { format!("I/O error on key file at '{}': {}", e.file_path, e.description) },

        KeyStore
            { reason: String }
            |e| { format!("key store error: {}", e.reason) },
    }
}
