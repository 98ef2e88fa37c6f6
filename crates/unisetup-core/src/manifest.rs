use anyhow::{anyhow, Context, Result};

/// Name of the main editor package; it always installs first.
pub const MAIN_PACKAGE: &str = "Unity";

pub fn manifest_file_name(version: &str) -> String {
    format!("unity-{version}-osx.ini")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub remote_path: String,
    pub size_bytes: u64,
    pub installed_size_bytes: u64,
    pub md5: Option<String>,
    pub install_by_default: bool,
}

impl PackageDescriptor {
    pub fn file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.remote_path)
    }

    pub fn is_main_package(&self) -> bool {
        self.name == MAIN_PACKAGE
    }
}

/// Per-version package descriptor, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    packages: Vec<PackageDescriptor>,
}

impl PackageManifest {
    pub fn new(packages: Vec<PackageDescriptor>) -> Self {
        Self { packages }
    }

    pub fn from_ini_str(input: &str) -> Result<Self> {
        let sections = parse_sections(input).context("failed to parse package manifest")?;
        let mut packages = Vec::with_capacity(sections.len());
        for section in sections {
            let name = section.name.clone();
            let descriptor = section
                .into_descriptor()
                .with_context(|| format!("invalid package section [{name}]"))?;
            packages.push(descriptor);
        }
        Ok(Self { packages })
    }

    pub fn packages(&self) -> &[PackageDescriptor] {
        &self.packages
    }

    pub fn get(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages
            .iter()
            .find(|package| package.name.eq_ignore_ascii_case(name))
    }

    /// Chooses packages to process.
    ///
    /// With no requested names this is every package (`all`) or the
    /// install-by-default ones. Requested names match case-insensitively; unknown
    /// names are skipped with a warning. The main package is moved to the front.
    pub fn select(&self, requested: &[String], all: bool) -> Vec<PackageDescriptor> {
        let mut selected: Vec<PackageDescriptor> = if requested.is_empty() {
            self.packages
                .iter()
                .filter(|package| all || package.install_by_default)
                .cloned()
                .collect()
        } else {
            let mut picked: Vec<PackageDescriptor> = Vec::new();
            for name in requested {
                match self.get(name) {
                    Some(package) => {
                        if !picked.iter().any(|existing| existing.name == package.name) {
                            picked.push(package.clone());
                        }
                    }
                    None => log::warn!("manifest has no package \"{name}\", skipping"),
                }
            }
            picked
        };

        if let Some(index) = selected.iter().position(PackageDescriptor::is_main_package) {
            let main = selected.remove(index);
            selected.insert(0, main);
        }
        selected
    }
}

pub fn total_download_size(selection: &[PackageDescriptor]) -> u64 {
    selection.iter().map(|package| package.size_bytes).sum()
}

pub fn total_installed_size(selection: &[PackageDescriptor]) -> u64 {
    selection
        .iter()
        .map(|package| package.installed_size_bytes)
        .sum()
}

#[derive(Debug)]
struct RawSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl RawSection {
    fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.value(key)
            .ok_or_else(|| anyhow!("missing required key '{key}'"))
    }

    fn into_descriptor(self) -> Result<PackageDescriptor> {
        let remote_path = self.required("url")?.to_string();
        if remote_path.is_empty() {
            return Err(anyhow!("key 'url' must not be empty"));
        }
        let size_bytes = parse_size(self.required("size")?, "size")?;
        let installed_size_bytes = parse_size(self.required("installedsize")?, "installedsize")?;
        let install_by_default = parse_bool(self.required("install")?)?;
        let md5 = self
            .value("md5")
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .map(str::to_ascii_lowercase);

        Ok(PackageDescriptor {
            name: self.name,
            remote_path,
            size_bytes,
            installed_size_bytes,
            md5,
            install_by_default,
        })
    }
}

fn parse_sections(input: &str) -> Result<Vec<RawSection>> {
    let mut sections: Vec<RawSection> = Vec::new();

    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow!("line {line_no}: malformed section header"))?;
            if sections.iter().any(|section| section.name == name) {
                return Err(anyhow!("line {line_no}: duplicate section [{name}]"));
            }
            sections.push(RawSection {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        let Some(section) = sections.last_mut() else {
            return Err(anyhow!("line {line_no}: key outside of any section"));
        };

        let continuation = raw_line.starts_with([' ', '\t']);
        match split_key_value(line) {
            Some((key, value)) if !continuation => {
                section
                    .entries
                    .push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
            _ => {
                // Indented lines extend the previous value.
                let Some((_, value)) = section.entries.last_mut() else {
                    return Err(anyhow!("line {line_no}: expected 'key = value'"));
                };
                value.push('\n');
                value.push_str(line);
            }
        }
    }

    Ok(sections)
}

/// Accepts ConfigParser-style `key=value` or `key: value`; the first delimiter wins.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let index = line.find(['=', ':'])?;
    let (key, value) = line.split_at(index);
    Some((key, &value[1..]))
}

fn parse_size(value: &str, key: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("key '{key}' must be a non-negative integer, got '{value}'"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(anyhow!("key 'install' must be a boolean, got '{other}'")),
    }
}
