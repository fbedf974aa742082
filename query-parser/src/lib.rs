/*!
# Scout Query Parser

Extracts typed context requests from free-form prose.

A request is introduced by an `@` marker immediately followed by a kind
keyword (`files`, `code`, `docs`, `git`, `folder`). The pattern body runs
until the next marker or the end of the input. Bodies support glob
wildcards, quoted multi-word targets, and several space-separated targets
per pattern. `AND`/`OR` tokens are recognized only between whole patterns.

Surrounding text is ordinary prose, not a command language: an unknown
keyword after `@` is inert text, an empty body is dropped, and unparseable
input yields an empty list rather than an error.

## Example

```
use scout_query_parser::{parse, ContextKind};

let requests = parse("look at @files src/main.rs and maybe @code login");
assert_eq!(requests.len(), 2);
assert_eq!(requests[0].kind, ContextKind::Files);
```
*/

mod parser;
mod request;

pub use parser::parse;
pub use request::{BooleanTerm, ContextKind, ContextRequest};
