// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, ResultExt};
use crate::util::Sha256;

/// Schema assumed when a definition does not name one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Quotes an identifier with square brackets.
pub fn quote(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// A schema-qualified server object name.
#[derive(
    Serialize,
    Deserialize,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Clone,
    Debug,
    Default,
)]
pub struct ObjectName {
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    pub fn new<S, N>(schema: S, name: N) -> ObjectName
    where
        S: Into<String>,
        N: Into<String>,
    {
        ObjectName {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Guesses the object name from a file name. Both `Schema.Object.sql`
    /// and `Object.sql` are understood.
    pub fn from_file_stem(path: &Path) -> ObjectName {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match stem.find('.') {
            Some(i) => ObjectName::new(&stem[..i], &stem[i + 1..]),
            None => ObjectName::new(DEFAULT_SCHEMA, stem),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            write!(f, "{}", quote(&self.name))
        } else {
            write!(f, "{}.{}", quote(&self.schema), quote(&self.name))
        }
    }
}

/// A two-letter server object type code, as found in `sys.objects.type`.
/// Table types have no row of their own there and use `TT`.
#[derive(
    Serialize,
    Deserialize,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Clone,
    Debug,
    Default,
)]
pub struct TypeCode(String);

impl TypeCode {
    pub const TABLE_TYPE: &'static str = "TT";
    pub const USER_TABLE: &'static str = "U";

    pub fn new(code: &str) -> TypeCode {
        TypeCode(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_table_type(&self) -> bool {
        self.0 == Self::TABLE_TYPE
    }

    /// The keyword to use in a `DROP` statement for objects of this type.
    pub fn drop_keyword(&self) -> Result<&'static str, ErrorKind> {
        Ok(match self.as_str() {
            "P" | "PC" | "X" => "PROCEDURE",
            "V" => "VIEW",
            "FN" | "IF" | "TF" | "FS" | "FT" => "FUNCTION",
            "TR" | "TA" => "TRIGGER",
            "R" => "RULE",
            "SN" => "SYNONYM",
            "SO" => "SEQUENCE",
            "AF" => "AGGREGATE",
            Self::TABLE_TYPE => "TYPE",
            Self::USER_TABLE => {
                return Err(ErrorKind::UnsupportedObjectType(self.0.clone()))
            }
            _ => return Err(ErrorKind::UnknownObjectType(self.0.clone())),
        })
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a source file appears to define, judging by its text alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: ObjectName,
    pub type_code: TypeCode,
}

const IDENT: &str = r#"\[(?:[^\]]|\]\])+\]|"[^"]+"|[\w@#$]+"#;

lazy_static! {
    static ref COMMENTS: Regex =
        Regex::new(r"(?s)/\*.*?\*/|--[^\n]*").unwrap();
    static ref TABLE_TYPE: Regex =
        Regex::new(r"(?is)\bCREATE\s+TYPE\s+[^;]+?\s+AS\s+TABLE\b").unwrap();
    static ref CREATE: Regex = Regex::new(&format!(
        r"(?is)\bCREATE\s+(?:OR\s+ALTER\s+)?(PROCEDURE|PROC|VIEW|FUNCTION|TRIGGER|TYPE|SYNONYM|SEQUENCE|AGGREGATE|RULE)\s+({ident})(?:\s*\.\s*({ident}))?",
        ident = IDENT
    ))
    .unwrap();
}

fn unquote(ident: &str) -> String {
    if ident.starts_with('[') && ident.ends_with(']') && ident.len() >= 2 {
        ident[1..ident.len() - 1].replace("]]", "]")
    } else if ident.starts_with('"') && ident.ends_with('"') && ident.len() >= 2
    {
        ident[1..ident.len() - 1].to_string()
    } else {
        ident.to_string()
    }
}

impl Declaration {
    /// Sniffs the object name and type out of a definition. This is only a
    /// hint for files the server has not told us about yet.
    pub fn sniff(path: &Path, contents: &str) -> Declaration {
        let text = COMMENTS.replace_all(contents, " ");

        let caps = match CREATE.captures(&text) {
            Some(caps) => caps,
            None => {
                return Declaration {
                    name: ObjectName::from_file_stem(path),
                    type_code: TypeCode::default(),
                }
            }
        };

        let name = match (caps.get(2), caps.get(3)) {
            (Some(schema), Some(object)) => {
                ObjectName::new(unquote(schema.as_str()), unquote(object.as_str()))
            }
            (Some(object), None) => {
                ObjectName::new(DEFAULT_SCHEMA, unquote(object.as_str()))
            }
            _ => ObjectName::from_file_stem(path),
        };

        let kind = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_default();

        let code = match kind.as_str() {
            "PROCEDURE" | "PROC" => "P",
            "VIEW" => "V",
            "FUNCTION" => "FN",
            "TRIGGER" => "TR",
            "SYNONYM" => "SN",
            "SEQUENCE" => "SO",
            "AGGREGATE" => "AF",
            "RULE" => "R",
            "TYPE" if TABLE_TYPE.is_match(&text) => TypeCode::TABLE_TYPE,
            _ => "",
        };

        Declaration {
            name,
            type_code: TypeCode::new(code),
        }
    }
}

/// The compilation state of one source file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MakeItem {
    /// Absolute path to the source file. Unique among the items of a folder.
    pathname: PathBuf,

    /// Schema of the server object, as reported by the server. Empty until
    /// the server has been asked.
    pub schema_name: String,

    /// Name of the server object, as reported by the server. Empty until the
    /// server has been asked.
    pub object_name: String,

    /// The name the file's text appears to declare.
    pub declared: ObjectName,

    /// Fingerprint of the file contents at the last observation.
    pub content_hash: Sha256,

    pub type_code: TypeCode,

    pub needs_to_be_compiled: bool,

    pub is_present_on_server: bool,

    /// Ordering class for drops (ascending) and compiles (descending).
    pub drop_order: i32,

    pub needs_to_be_dropped: bool,
}

impl MakeItem {
    /// Creates an item for a file seen for the first time.
    pub fn new(pathname: PathBuf) -> Result<MakeItem, Error> {
        let contents = fs::read(&pathname).with_context(|_| {
            format!("Failed reading source file {:?}", pathname)
        })?;

        Ok(Self::from_contents(pathname, &contents))
    }

    pub fn from_contents(pathname: PathBuf, contents: &[u8]) -> MakeItem {
        let declaration =
            Declaration::sniff(&pathname, &String::from_utf8_lossy(contents));

        MakeItem {
            pathname,
            schema_name: String::new(),
            object_name: String::new(),
            declared: declaration.name,
            content_hash: Sha256::from_bytes(contents),
            type_code: declaration.type_code,
            needs_to_be_compiled: true,
            is_present_on_server: false,
            drop_order: 0,
            needs_to_be_dropped: false,
        }
    }

    pub fn pathname(&self) -> &Path {
        &self.pathname
    }

    pub fn filename(&self) -> String {
        self.pathname
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the server has told us what this file defines.
    pub fn has_server_metadata(&self) -> bool {
        !self.object_name.is_empty()
    }

    /// The best known name of the object this file defines. Server-reported
    /// names win over the local guess.
    pub fn object(&self) -> ObjectName {
        if self.has_server_metadata() {
            ObjectName::new(self.schema_name.clone(), self.object_name.clone())
        } else {
            self.declared.clone()
        }
    }

    /// Re-hashes the file. Returns `true` if the contents changed since the
    /// last observation, in which case the local hints are refreshed too.
    pub fn refresh(&mut self) -> Result<bool, Error> {
        let contents = fs::read(&self.pathname).with_context(|_| {
            format!("Failed reading source file {:?}", self.pathname)
        })?;

        let hash = Sha256::from_bytes(&contents);

        if hash == self.content_hash {
            self.needs_to_be_compiled = false;
            return Ok(false);
        }

        let declaration = Declaration::sniff(
            &self.pathname,
            &String::from_utf8_lossy(&contents),
        );

        self.declared = declaration.name;

        if !self.has_server_metadata() {
            self.type_code = declaration.type_code;
        }

        self.content_hash = hash;
        self.needs_to_be_compiled = true;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(contents: &str) -> Declaration {
        Declaration::sniff(Path::new("/sql/dbo.Fallback.sql"), contents)
    }

    #[test]
    fn patterns_are_valid() {
        lazy_static::initialize(&COMMENTS);
        lazy_static::initialize(&TABLE_TYPE);
        lazy_static::initialize(&CREATE);

        // The same compiled patterns serve every file.
        let a = sniff("CREATE VIEW dbo.A AS SELECT 1");
        let b = sniff("CREATE VIEW dbo.B AS SELECT 1");
        assert_eq!(a.name, ObjectName::new("dbo", "A"));
        assert_eq!(b.name, ObjectName::new("dbo", "B"));
    }

    #[test]
    fn sniff_procedure() {
        let d = sniff(
            "-- CREATE VIEW dbo.Commented\nCREATE PROCEDURE [Sales].[Get Orders]\nAS SELECT 1",
        );
        assert_eq!(d.name, ObjectName::new("Sales", "Get Orders"));
        assert_eq!(d.type_code, TypeCode::new("P"));
    }

    #[test]
    fn sniff_table_type() {
        let d = sniff("create type dbo.IdList as table (Id int not null)");
        assert_eq!(d.name, ObjectName::new("dbo", "IdList"));
        assert!(d.type_code.is_table_type());
    }

    #[test]
    fn sniff_alias_type_is_not_table_type() {
        let d = sniff("CREATE TYPE Phone FROM varchar(20)");
        assert_eq!(d.name, ObjectName::new("dbo", "Phone"));
        assert!(d.type_code.is_empty());
    }

    #[test]
    fn sniff_falls_back_to_file_name() {
        let d = sniff("/* CREATE PROCEDURE x */ SELECT 1");
        assert_eq!(d.name, ObjectName::new("dbo", "Fallback"));
        assert!(d.type_code.is_empty());
    }

    #[test]
    fn sniff_create_or_alter() {
        let d = sniff("CREATE OR ALTER FUNCTION Calc() RETURNS int AS BEGIN RETURN 1 END");
        assert_eq!(d.name, ObjectName::new("dbo", "Calc"));
        assert_eq!(d.type_code.as_str(), "FN");
    }

    #[test]
    fn drop_keywords() {
        assert_eq!(TypeCode::new("p ").drop_keyword().unwrap(), "PROCEDURE");
        assert_eq!(TypeCode::new("TT").drop_keyword().unwrap(), "TYPE");
        assert_eq!(TypeCode::new("IF").drop_keyword().unwrap(), "FUNCTION");

        match TypeCode::new("U").drop_keyword() {
            Err(ErrorKind::UnsupportedObjectType(code)) => assert_eq!(code, "U"),
            other => panic!("unexpected {:?}", other),
        }

        match TypeCode::new("ZZ").drop_keyword() {
            Err(ErrorKind::UnknownObjectType(code)) => assert_eq!(code, "ZZ"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn object_name_display() {
        assert_eq!(
            ObjectName::new("dbo", "Odd]Name").to_string(),
            "[dbo].[Odd]]Name]"
        );
    }

    #[test]
    fn server_names_win() {
        let mut item = MakeItem::from_contents(
            PathBuf::from("/sql/Foo.sql"),
            b"CREATE PROCEDURE dbo.Foo AS SELECT 1",
        );

        assert!(item.needs_to_be_compiled);
        assert_eq!(item.object(), ObjectName::new("dbo", "Foo"));

        item.schema_name = "app".into();
        item.object_name = "Foo".into();
        assert_eq!(item.object(), ObjectName::new("app", "Foo"));
        assert_eq!(item.filename(), "Foo.sql");
    }
}
