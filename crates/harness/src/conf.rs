//! Host configuration text generation.
//!
//! Mechanical builder for the directive-style configuration the host
//! process consumes. The core of the harness never interprets this text;
//! it only installs it and requests a restart.

/// Builder for one host configuration document.
#[derive(Debug, Default)]
pub struct HostConfBuilder {
    lines: Vec<String>,
}

impl HostConfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw directive line.
    pub fn add(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Administrative contact used for ACME account registration.
    pub fn admin(self, email: &str) -> Self {
        self.add(format!("Admin mailto:{email}"))
    }

    /// Declare one managed domain covering `domains`.
    pub fn managed_domain(self, domains: &[String]) -> Self {
        self.add(format!("ManagedDomain {}", domains.join(" ")))
    }

    /// Open a managed-domain block for per-domain directives.
    pub fn start_managed_domain(self, domains: &[String]) -> Self {
        self.add(format!("<ManagedDomain {}>", domains.join(" ")))
    }

    /// Close a managed-domain block.
    pub fn end_managed_domain(self) -> Self {
        self.add("</ManagedDomain>")
    }

    /// Restrict the CA challenge types offered for validation.
    pub fn ca_challenges(self, challenges: &[&str]) -> Self {
        self.add(format!("CAChallenges {}", challenges.join(" ")))
    }

    /// Command executed to set up dns-01 challenge records.
    pub fn dns01_cmd(self, command: &str) -> Self {
        self.add(format!("Dns01Command {command}"))
    }

    /// Renewal mode (`auto`, `always`, `manual`).
    pub fn renew_mode(self, mode: &str) -> Self {
        self.add(format!("RenewMode {mode}"))
    }

    /// Statically configured certificate file.
    pub fn certificate_file(self, path: &str) -> Self {
        self.add(format!("CertificateFile {path}"))
    }

    /// Statically configured private key file.
    pub fn certificate_key_file(self, path: &str) -> Self {
        self.add(format!("CertificateKeyFile {path}"))
    }

    /// Private key types to generate on renewal.
    pub fn private_keys(self, specs: &[&str]) -> Self {
        self.add(format!("PrivateKeys {}", specs.join(" ")))
    }

    /// Virtual host serving `domains`, first name as server name.
    pub fn vhost(mut self, domains: &[String]) -> Self {
        self.lines.push("<VirtualHost *:443>".to_string());
        if let Some((first, rest)) = domains.split_first() {
            self.lines.push(format!("    ServerName {first}"));
            for alias in rest {
                self.lines.push(format!("    ServerAlias {alias}"));
            }
        }
        self.lines.push("</VirtualHost>".to_string());
        self
    }

    /// Render the configuration document.
    pub fn build(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}
