use super::SignalProbe;
use crate::error::{ProbeError, ProbeKind};
use crate::signals::{CertificateSignals, ProbeReport};
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

const HTTPS_PORT: u16 = 443;

/// Outcome of trying to reach the HTTPS port.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Nothing listening. Not a probe failure, just no HTTPS service.
    Refused,
    Probe(ProbeError),
}

pub fn classify_connect_error(err: &io::Error) -> ConnectFailure {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ConnectFailure::Refused,
        io::ErrorKind::TimedOut => ConnectFailure::Probe(ProbeError::SslTimeout),
        _ => ConnectFailure::Probe(ProbeError::SslFailure(err.to_string())),
    }
}

/// True when the handshake failed inside TLS (bad chain, alert, protocol
/// mismatch) rather than on the socket.
pub fn is_tls_error(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .is_some()
}

/// Issuer and subject compared as raw DER names. `None` if the certificate
/// cannot be parsed.
pub fn is_self_signed(der: &[u8]) -> Option<bool> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(cert.issuer().as_raw() == cert.subject().as_raw())
}

/// Accepts any server certificate. Only used to read the certificate of a
/// host that already failed validation.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}

/// Derives `ssl_valid` and `is_self_signed` from a TLS handshake, on port
/// 443 unless built with `with_trust`.
pub struct CertificateProbe {
    timeout: Duration,
    port: u16,
    verified: TlsConnector,
    unverified: TlsConnector,
}

impl CertificateProbe {
    pub fn new(timeout: Duration) -> Self {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        Self::with_trust(timeout, roots, HTTPS_PORT)
    }

    /// Probe validating against `roots` and connecting to `port`.
    pub fn with_trust(timeout: Duration, roots: RootCertStore, port: u16) -> Self {
        let verified = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let unverified = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();

        Self {
            timeout,
            port,
            verified: TlsConnector::from(Arc::new(verified)),
            unverified: TlsConnector::from(Arc::new(unverified)),
        }
    }

    async fn connect(&self, domain: &str) -> Result<TcpStream, ConnectFailure> {
        let addrs: Vec<_> = match timeout(self.timeout, lookup_host((domain, self.port))).await {
            Err(_) => return Err(ConnectFailure::Probe(ProbeError::SslTimeout)),
            Ok(Err(e)) => {
                log::warn!("SSL DNS error for {domain}: {e}");
                return Err(ConnectFailure::Probe(ProbeError::SslDnsResolution));
            }
            Ok(Ok(addrs)) => addrs.collect(),
        };
        if addrs.is_empty() {
            log::warn!("SSL DNS error for {domain}: no addresses");
            return Err(ConnectFailure::Probe(ProbeError::SslDnsResolution));
        }

        match timeout(self.timeout, TcpStream::connect(&addrs[..])).await {
            Err(_) => Err(ConnectFailure::Probe(ProbeError::SslTimeout)),
            Ok(Err(e)) => Err(classify_connect_error(&e)),
            Ok(Ok(stream)) => Ok(stream),
        }
    }

    fn peer_is_self_signed(stream: &TlsStream<TcpStream>) -> bool {
        stream
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|chain| chain.first())
            .and_then(|leaf| is_self_signed(leaf.as_ref()))
            .unwrap_or(false)
    }

    /// Second handshake with validation disabled, purely to read the
    /// certificate. Any failure here just means "not known to be self-signed".
    async fn self_signed_unverified(&self, domain: &str, server_name: ServerName<'static>) -> bool {
        let stream = match self.connect(domain).await {
            Ok(stream) => stream,
            Err(_) => return false,
        };
        match timeout(self.timeout, self.unverified.connect(server_name, stream)).await {
            Ok(Ok(tls)) => Self::peer_is_self_signed(&tls),
            _ => false,
        }
    }
}

#[async_trait]
impl SignalProbe<CertificateSignals> for CertificateProbe {
    fn name(&self) -> &str {
        "ssl"
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Ssl
    }

    async fn probe(&self, domain: &str) -> ProbeReport<CertificateSignals> {
        let server_name = match ServerName::try_from(domain.to_string()) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Cannot use {domain} as a TLS server name: {e}");
                return ProbeReport::failed(ProbeError::SslFailure(
                    "invalid server name".to_string(),
                ));
            }
        };

        let stream = match self.connect(domain).await {
            Ok(stream) => stream,
            Err(ConnectFailure::Refused) => {
                log::debug!("No HTTPS service on {domain}");
                return ProbeReport::ok(CertificateSignals::default());
            }
            Err(ConnectFailure::Probe(e)) => {
                log::warn!("SSL connection failure for {domain}: {e}");
                return ProbeReport::failed(e);
            }
        };

        match timeout(self.timeout, self.verified.connect(server_name.clone(), stream)).await {
            Err(_) => {
                log::warn!("SSL handshake timeout for {domain}");
                ProbeReport::failed(ProbeError::SslTimeout)
            }
            Ok(Ok(tls)) => {
                let is_self_signed = Self::peer_is_self_signed(&tls);
                log::debug!("Valid SSL certificate for {domain} (self-signed: {is_self_signed})");
                ProbeReport::ok(CertificateSignals {
                    ssl_valid: true,
                    is_self_signed,
                })
            }
            Ok(Err(e)) if is_tls_error(&e) => {
                log::warn!("SSL validation failed for {domain}: {e}");
                let is_self_signed = self.self_signed_unverified(domain, server_name).await;
                if is_self_signed {
                    log::debug!("Self-signed certificate detected for {domain}");
                }
                ProbeReport::ok(CertificateSignals {
                    ssl_valid: false,
                    is_self_signed,
                })
            }
            Ok(Err(e)) => {
                log::error!("SSL error for {domain}: {e}");
                ProbeReport::failed(ProbeError::SslFailure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_refused_is_benign() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify_connect_error(&err), ConnectFailure::Refused);
    }

    #[test]
    fn test_connect_timeout_classified() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert_eq!(
            classify_connect_error(&err),
            ConnectFailure::Probe(ProbeError::SslTimeout)
        );
    }

    #[test]
    fn test_unclassified_connect_error() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "blocked");
        match classify_connect_error(&err) {
            ConnectFailure::Probe(ProbeError::SslFailure(msg)) => assert!(msg.contains("blocked")),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_tls_error_detection() {
        let tls = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        );
        assert!(is_tls_error(&tls));

        let socket = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(!is_tls_error(&socket));
    }

    #[test]
    fn test_unparseable_certificate() {
        assert_eq!(is_self_signed(b"not a certificate"), None);
    }

    #[tokio::test]
    async fn test_invalid_server_name_reported() {
        let probe = CertificateProbe::new(Duration::from_secs(1));
        for name in ["bad name", "123.456"] {
            let report = probe.probe(name).await;
            assert_eq!(report.signals, CertificateSignals::default());
            assert_eq!(
                report.errors,
                vec![ProbeError::SslFailure("invalid server name".to_string())]
            );
            // Must not be mistaken for a DNS failure by the risk rules.
            assert!(!report.errors[0].to_string().to_lowercase().contains("dns"));
        }
    }

    mod handshake {
        use super::*;
        use rcgen::{
            BasicConstraints, CertificateParams, DistinguishedName, DnType,
            ExtendedKeyUsagePurpose, IsCa, KeyPair,
        };
        use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
        use rustls::ServerConfig;
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;
        use tokio_rustls::TlsAcceptor;

        struct Identity {
            cert: CertificateDer<'static>,
            key: PrivateKeyDer<'static>,
        }

        fn named(common_name: &str) -> DistinguishedName {
            let mut name = DistinguishedName::new();
            name.push(DnType::CommonName, common_name);
            name
        }

        fn self_signed_localhost() -> Identity {
            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
            params.distinguished_name = named("localhost");
            let cert = params.self_signed(&key).unwrap();
            Identity {
                cert: cert.der().clone(),
                key: PrivatePkcs8KeyDer::from(key.serialize_der()).into(),
            }
        }

        /// A test CA and a `localhost` leaf it issued.
        fn ca_issued_localhost() -> (CertificateDer<'static>, Identity) {
            let ca_key = KeyPair::generate().unwrap();
            let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
            ca_params.distinguished_name = named("Domain Risk Test CA");
            ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            let ca = ca_params.self_signed(&ca_key).unwrap();

            let leaf_key = KeyPair::generate().unwrap();
            let mut leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
            leaf_params.distinguished_name = named("localhost");
            leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
            let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

            (
                ca.der().clone(),
                Identity {
                    cert: leaf.der().clone(),
                    key: PrivatePkcs8KeyDer::from(leaf_key.serialize_der()).into(),
                },
            )
        }

        /// TLS server on an ephemeral localhost port, accepting any number
        /// of handshakes.
        async fn serve(identity: Identity) -> u16 {
            let config = ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(vec![identity.cert], identity.key)
                .unwrap();
            let acceptor = TlsAcceptor::from(Arc::new(config));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();

            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        if let Ok(mut tls) = acceptor.accept(stream).await {
                            let mut buf = [0u8; 1];
                            let _ = tls.read(&mut buf).await;
                        }
                    });
                }
            });
            port
        }

        fn probe_with_roots(roots: RootCertStore, port: u16) -> CertificateProbe {
            CertificateProbe::with_trust(Duration::from_secs(5), roots, port)
        }

        fn webpki_probe(port: u16) -> CertificateProbe {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            probe_with_roots(roots, port)
        }

        #[test]
        fn test_self_signed_detection_on_real_certificates() {
            assert_eq!(is_self_signed(self_signed_localhost().cert.as_ref()), Some(true));

            let (ca, leaf) = ca_issued_localhost();
            assert_eq!(is_self_signed(leaf.cert.as_ref()), Some(false));
            // A root is its own issuer.
            assert_eq!(is_self_signed(ca.as_ref()), Some(true));
        }

        #[tokio::test]
        async fn test_connection_refused_records_nothing() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            drop(listener);

            let report = webpki_probe(port).probe("localhost").await;
            assert_eq!(report.signals, CertificateSignals::default());
            assert!(report.errors.is_empty());
        }

        #[tokio::test]
        async fn test_trusted_certificate_is_valid() {
            let (ca, leaf) = ca_issued_localhost();
            let port = serve(leaf).await;

            let mut roots = RootCertStore::empty();
            roots.add(ca).unwrap();
            let report = probe_with_roots(roots, port).probe("localhost").await;

            assert_eq!(
                report.signals,
                CertificateSignals {
                    ssl_valid: true,
                    is_self_signed: false
                }
            );
            assert!(report.errors.is_empty());
        }

        #[tokio::test]
        async fn test_self_signed_certificate_found_on_retry() {
            let port = serve(self_signed_localhost()).await;

            let report = webpki_probe(port).probe("localhost").await;
            assert_eq!(
                report.signals,
                CertificateSignals {
                    ssl_valid: false,
                    is_self_signed: true
                }
            );
            assert!(report.errors.is_empty());
        }

        #[tokio::test]
        async fn test_untrusted_issuer_is_invalid_but_not_self_signed() {
            let (_, leaf) = ca_issued_localhost();
            let port = serve(leaf).await;

            let report = webpki_probe(port).probe("localhost").await;
            assert_eq!(
                report.signals,
                CertificateSignals {
                    ssl_valid: false,
                    is_self_signed: false
                }
            );
            assert!(report.errors.is_empty());
        }
    }
}
