//! Console lines, query-form strings and web request paths.

use super::{normalize_module, ParsedExpression};
use crate::cast::cast;
use crate::error::{ParseError, Result};
use crate::value::Params;

/// Turn a console line into query form.
///
/// Tokenizes with shell quoting rules. The first token is the path (slashes
/// become dots), every following token is a `key=value` pair:
///
/// ```
/// use bee_proto::expr::console_to_query;
///
/// let q = console_to_query("users/Account/find id='i+ 3' name=bob").unwrap();
/// assert_eq!(q, "users.Account.find?id=i+ 3&name=bob");
/// ```
pub fn console_to_query(line: &str) -> Result<String, ParseError> {
    let mut tokens =
        shlex::split(line).ok_or_else(|| ParseError::Quoting(line.trim().to_string()))?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let path = tokens.remove(0).replace('/', ".");
    Ok(format!("{}?{}", path, tokens.join("&")))
}

/// Parse a console line straight into an expression.
pub fn parse_console(line: &str) -> Result<ParsedExpression> {
    parse_query(&console_to_query(line)?)
}

/// Parse a query-form string `module.Class.function?k=v&k2=v2`.
///
/// The last path segment is the function, the one before it the class and
/// everything before that the module. Values are cast; pairs without `=`
/// are skipped.
pub fn parse_query(exp: &str) -> Result<ParsedExpression> {
    let (path, query) = split_url(exp);
    let mut data = Params::new();
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            data.insert(key.to_string(), cast(value)?);
        }
    }
    Ok(from_path(path, data))
}

/// Parse a web request target such as `/users/Account/find?id=i%2B%203`.
///
/// The path must contain exactly three segments. Path and query components
/// are percent-decoded before casting.
pub fn parse_url(target: &str) -> Result<ParsedExpression> {
    let (path, query) = split_url(target);
    let path = decode(path.strip_prefix('/').unwrap_or(path))?.replace('/', ".");
    if path.matches('.').count() != 2 {
        return Err(ParseError::Arity { path }.into());
    }

    let mut data = Params::new();
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            data.insert(decode(key)?, cast(&decode(value)?)?);
        }
    }
    Ok(from_path(&path, data))
}

fn split_url(exp: &str) -> (&str, &str) {
    let exp = exp.split_once('#').map_or(exp, |(head, _)| head);
    exp.split_once('?').unwrap_or((exp, ""))
}

fn decode(raw: &str) -> Result<String, ParseError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ParseError::Encoding(e.to_string()))
}

fn from_path(path: &str, data: Params) -> ParsedExpression {
    let mut segments: Vec<&str> = path.split('.').collect();
    let function = segments.pop().filter(|s| !s.is_empty()).map(str::to_string);
    let class = segments.pop().filter(|s| !s.is_empty()).map(str::to_string);
    let module = normalize_module(&segments.join("."));
    ParsedExpression {
        module,
        class,
        function,
        data,
    }
}
