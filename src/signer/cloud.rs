//! Azure cloud environments and their endpoints.

use super::error::SignerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudEnvironment {
    pub name: &'static str,
    pub active_directory_endpoint: &'static str,
    pub key_vault_endpoint: &'static str,
    pub key_vault_dns_suffix: &'static str,
    pub service_management_endpoint: &'static str,
}

pub const AZURE_PUBLIC_CLOUD: CloudEnvironment = CloudEnvironment {
    name: "AzurePublicCloud",
    active_directory_endpoint: "https://login.microsoftonline.com/",
    key_vault_endpoint: "https://vault.azure.net/",
    key_vault_dns_suffix: "vault.azure.net",
    service_management_endpoint: "https://management.core.windows.net/",
};

pub const AZURE_CHINA_CLOUD: CloudEnvironment = CloudEnvironment {
    name: "AzureChinaCloud",
    active_directory_endpoint: "https://login.chinacloudapi.cn/",
    key_vault_endpoint: "https://vault.azure.cn/",
    key_vault_dns_suffix: "vault.azure.cn",
    service_management_endpoint: "https://management.core.chinacloudapi.cn/",
};

pub const AZURE_US_GOVERNMENT_CLOUD: CloudEnvironment = CloudEnvironment {
    name: "AzureUSGovernmentCloud",
    active_directory_endpoint: "https://login.microsoftonline.us/",
    key_vault_endpoint: "https://vault.usgovcloudapi.net/",
    key_vault_dns_suffix: "vault.usgovcloudapi.net",
    service_management_endpoint: "https://management.core.usgovcloudapi.net/",
};

pub const AZURE_GERMAN_CLOUD: CloudEnvironment = CloudEnvironment {
    name: "AzureGermanCloud",
    active_directory_endpoint: "https://login.microsoftonline.de/",
    key_vault_endpoint: "https://vault.microsoftazure.de/",
    key_vault_dns_suffix: "vault.microsoftazure.de",
    service_management_endpoint: "https://management.core.cloudapi.de/",
};

const ENVIRONMENTS: [CloudEnvironment; 4] = [
    AZURE_PUBLIC_CLOUD,
    AZURE_CHINA_CLOUD,
    AZURE_US_GOVERNMENT_CLOUD,
    AZURE_GERMAN_CLOUD,
];

impl CloudEnvironment {
    /// Look up an environment by name; an empty name selects the public cloud
    pub fn from_name(name: &str) -> Result<Self, SignerError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(AZURE_PUBLIC_CLOUD);
        }

        ENVIRONMENTS
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| SignerError::UnknownCloud(name.to_string()))
    }

    /// Key Vault token resource, without the trailing slash
    pub fn key_vault_resource(&self) -> &'static str {
        self.key_vault_endpoint.trim_end_matches('/')
    }
}
