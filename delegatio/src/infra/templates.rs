//! Resource definition templates.
//!
//! Templates are opaque libvirt XML with `{{field}}` placeholders for the
//! identity fields the provisioner substitutes. Each builtin can be replaced
//! by a file of the same name in the configured template directory.

use delegatio_shared::{DelegatioError, DelegatioResult};
use std::path::Path;

const POOL_XML: &str = r#"<pool type="dir">
  <name>{{name}}</name>
  <target>
    <path>{{path}}</path>
  </target>
</pool>
"#;

const BASE_VOLUME_XML: &str = r#"<volume type="file">
  <name>{{name}}</name>
  <capacity unit="bytes">{{capacity}}</capacity>
  <target>
    <path>{{path}}</path>
    <format type="qcow2"/>
  </target>
</volume>
"#;

const BOOT_VOLUME_XML: &str = r#"<volume type="file">
  <name>{{name}}</name>
  <capacity unit="bytes">{{capacity}}</capacity>
  <target>
    <path>{{path}}</path>
    <format type="qcow2"/>
  </target>
  <backingStore>
    <path>{{backing}}</path>
    <format type="qcow2"/>
  </backingStore>
</volume>
"#;

const NETWORK_XML: &str = r#"<network>
  <name>{{name}}</name>
  <forward mode="nat"/>
  <bridge name="virbr-dlg" stp="on" delay="0"/>
  <ip address="10.42.0.1" netmask="255.255.255.0">
    <dhcp>
      <range start="10.42.0.10" end="10.42.0.254"/>
    </dhcp>
  </ip>
</network>
"#;

const DOMAIN_XML: &str = r#"<domain type="kvm">
  <name>{{name}}</name>
  <memory unit="GiB">4</memory>
  <vcpu>2</vcpu>
  <os>
    <type arch="x86_64">hvm</type>
    <boot dev="hd"/>
  </os>
  <features>
    <acpi/>
  </features>
  <cpu mode="host-passthrough"/>
  <devices>
    <disk type="volume" device="disk">
      <driver name="qemu" type="qcow2"/>
      <source pool="{{pool}}" volume="{{volume}}"/>
      <target dev="vda" bus="virtio"/>
    </disk>
    <interface type="network">
      <source network="{{network}}"/>
      <model type="virtio"/>
    </interface>
    <serial type="pty">
      <target port="0"/>
    </serial>
    <console type="pty">
      <target type="serial" port="0"/>
    </console>
  </devices>
</domain>
"#;

/// The five resource templates.
#[derive(Clone, Debug)]
pub struct Templates {
    pub pool: String,
    pub base_volume: String,
    pub boot_volume: String,
    pub network: String,
    pub domain: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Templates {
    pub fn builtin() -> Self {
        Self {
            pool: POOL_XML.to_string(),
            base_volume: BASE_VOLUME_XML.to_string(),
            boot_volume: BOOT_VOLUME_XML.to_string(),
            network: NETWORK_XML.to_string(),
            domain: DOMAIN_XML.to_string(),
        }
    }

    /// Builtins, with any of `pool.xml`, `base-volume.xml`, `boot-volume.xml`,
    /// `network.xml` and `domain.xml` found in `dir` taking precedence.
    pub fn load(dir: &Path) -> DelegatioResult<Self> {
        if !dir.is_dir() {
            return Err(DelegatioError::Config(format!(
                "template directory does not exist: {}",
                dir.display()
            )));
        }

        let mut templates = Self::builtin();
        for (file, slot) in [
            ("pool.xml", &mut templates.pool),
            ("base-volume.xml", &mut templates.base_volume),
            ("boot-volume.xml", &mut templates.boot_volume),
            ("network.xml", &mut templates.network),
            ("domain.xml", &mut templates.domain),
        ] {
            let path = dir.join(file);
            if path.exists() {
                *slot = std::fs::read_to_string(&path).map_err(|e| {
                    DelegatioError::Config(format!(
                        "Failed to read template {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                tracing::debug!(template = %path.display(), "Loaded template override");
            }
        }
        Ok(templates)
    }
}

/// Substitute `{{key}}` placeholders. Fails if any placeholder remains.
pub fn render(template: &str, fields: &[(&str, &str)]) -> DelegatioResult<String> {
    let mut rendered = template.to_string();
    for (key, value) in fields {
        rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
    }

    if let Some(start) = rendered.find("{{") {
        let end = rendered[start..]
            .find("}}")
            .map(|offset| start + offset + 2)
            .unwrap_or(rendered.len());
        return Err(DelegatioError::Config(format!(
            "template placeholder {} has no value",
            &rendered[start..end]
        )));
    }
    Ok(rendered)
}
