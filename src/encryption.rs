//! Decryption of `encrypted_` source files.
use std::fmt;

use anyhow::{Result, bail};

/// Decrypts source file contents before they are rendered.
pub trait EncryptionTool: fmt::Debug {
    /// Return the plaintext of `ciphertext`. `name` is used in messages.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails.
    fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Refuses every decryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

impl EncryptionTool for NoEncryption {
    fn decrypt(&self, name: &str, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        bail!("{name}: no encryption tool configured")
    }
}

/// Shells out to `gpg --decrypt`, piping the ciphertext on stdin.
#[derive(Debug, Clone)]
pub struct GpgEncryption {
    /// Program to run.
    pub command: String,
    /// Extra arguments placed before `--decrypt`.
    pub args: Vec<String>,
}

impl Default for GpgEncryption {
    fn default() -> Self {
        Self {
            command: "gpg".to_string(),
            args: Vec::new(),
        }
    }
}

impl EncryptionTool for GpgEncryption {
    fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.extend(["--quiet", "--decrypt"]);
        tracing::debug!("decrypting {name} with {}", self.command);
        crate::exec::run_with_input(&self.command, &args, ciphertext)
            .map_err(|err| err.context(format!("{name}: decryption failed")))
    }
}
