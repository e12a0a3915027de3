// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `import.meta` for source modules.

use crate::module_system::ModuleResolver;
use crate::value::{NativeFunction, Value};
use std::path::PathBuf;
use url::Url;

/// Per-module metadata exposed to module code as `import.meta`
#[derive(Debug, Clone)]
pub struct ImportMeta {
    /// The URL of the current module
    pub url: Url,
    /// Local path, for `file:` modules
    pub filename: Option<PathBuf>,
    /// Directory of `filename`
    pub dirname: Option<PathBuf>,
    /// Whether this is the entry module of the load
    pub main: bool,
    resolver: ModuleResolver,
}

impl ImportMeta {
    /// Create import.meta for a module
    pub fn new(url: Url, is_main: bool, resolver: ModuleResolver) -> Self {
        let filename = if url.scheme() == "file" {
            url.to_file_path().ok()
        } else {
            None
        };
        let dirname = filename
            .as_ref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf());

        Self {
            url,
            filename,
            dirname,
            main: is_main,
            resolver,
        }
    }

    /// Resolve a specifier the way an import in this module would.
    ///
    /// `base` overrides the referrer when given.
    pub fn resolve(&self, specifier: &str, base: Option<&Url>) -> crate::Result<String> {
        let referrer = base.unwrap_or(&self.url);
        self.resolver
            .resolve(specifier, referrer)
            .map(|resolved| resolved.as_str().to_string())
    }

    /// Convert to the object module code sees
    pub fn to_value(&self) -> Value {
        let path_value = |p: &Option<PathBuf>| match p {
            Some(p) => Value::string(p.display().to_string()),
            None => Value::Undefined,
        };

        let meta = self.clone();
        let resolve = NativeFunction::new("resolve", move |args| {
            let specifier = match args.first() {
                Some(Value::String(s)) => s.as_str(),
                other => {
                    return Err(format!(
                        "import.meta.resolve() expects a string specifier, received {}",
                        other.map_or("undefined", Value::type_name)
                    ));
                }
            };
            let base = match args.get(1) {
                None | Some(Value::Undefined) => None,
                Some(value) => {
                    let text = value.to_string();
                    Some(Url::parse(&text).map_err(|err| format!("Invalid base URL '{}': {}", text, err))?)
                }
            };
            meta.resolve(specifier, base.as_ref())
                .map(Value::String)
                .map_err(|err| err.to_string())
        });

        Value::object([
            ("url", Value::string(self.url.as_str())),
            ("filename", path_value(&self.filename)),
            ("dirname", path_value(&self.dirname)),
            ("main", Value::Boolean(self.main)),
            ("resolve", Value::Function(resolve)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_map::ImportMap;
    use crate::sandbox::{HostModules, PATH_MODULE};
    use std::sync::Arc;

    fn meta(url: &str, main: bool) -> ImportMeta {
        let base = Url::parse("file:///project/").unwrap();
        let resolver = ModuleResolver::new(
            Arc::new(ImportMap::new().with_import("utils", "./lib/utils.js").parse(&base)),
            Arc::new(HostModules::with_builtins()),
        );
        ImportMeta::new(Url::parse(url).unwrap(), main, resolver)
    }

    fn call_resolve(value: &Value, args: &[Value]) -> Result<Value, String> {
        match value.get_property("resolve") {
            Some(Value::Function(f)) => f.call(args),
            other => panic!("resolve is not a function: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_file_module_paths() {
        let meta = meta("file:///project/src/main.js", true);
        assert_eq!(meta.filename, Some(PathBuf::from("/project/src/main.js")));
        assert_eq!(meta.dirname, Some(PathBuf::from("/project/src")));

        let value = meta.to_value();
        assert_eq!(value.get_property("url"), Some(Value::string("file:///project/src/main.js")));
        assert_eq!(value.get_property("main"), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_remote_module_has_no_filename() {
        let value = meta("https://cdn.test/m.js", false).to_value();
        assert_eq!(value.get_property("filename"), Some(Value::Undefined));
        assert_eq!(value.get_property("dirname"), Some(Value::Undefined));
    }

    #[test]
    fn test_resolve_function() {
        let value = meta("file:///project/src/main.js", false).to_value();

        assert_eq!(
            call_resolve(&value, &[Value::string("./peer.js")]),
            Ok(Value::string("file:///project/src/peer.js"))
        );
        assert_eq!(
            call_resolve(&value, &[Value::string("utils")]),
            Ok(Value::string("file:///project/lib/utils.js"))
        );
        assert_eq!(
            call_resolve(&value, &[Value::string(PATH_MODULE)]),
            Ok(Value::string(PATH_MODULE))
        );
        assert_eq!(
            call_resolve(
                &value,
                &[Value::string("./x.js"), Value::string("file:///elsewhere/y.js")]
            ),
            Ok(Value::string("file:///elsewhere/x.js"))
        );
        assert!(call_resolve(&value, &[Value::string("unmapped")]).is_err());
        assert!(call_resolve(&value, &[]).is_err());
    }
}
