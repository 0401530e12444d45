// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional TLS for the session transport.
//!
//! The server needs a PEM certificate chain and private key; the client
//! trusts exactly the certificate it was configured with, which covers the
//! self-signed deployments this tool is pointed at. Provisioning the
//! material is out of scope.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS material unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("no private key found in {0}")]
    NoKey(PathBuf),

    #[error("TLS setup failed: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),

    #[error("hostname {0:?} is not a valid TLS server name")]
    BadServerName(String),
}

pub fn acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| TlsError::NoKey(key_path.to_path_buf()))?;
    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

pub fn connector(cert_path: &Path) -> Result<TlsConnector, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(cert_path)? {
        roots.add(cert)?;
    }
    let config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

pub fn server_name(hostname: &str) -> Result<ServerName<'static>, TlsError> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| TlsError::BadServerName(hostname.to_string()))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs: Result<Vec<_>, _> =
        rustls_pemfile::certs(&mut BufReader::new(File::open(path)?)).collect();
    Ok(certs?)
}
