//! HTTP status codes and server error numbers (`errorNum`) the driver inspects.

// HTTP status codes.
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_ACCEPTED: u16 = 202;
pub const HTTP_NO_CONTENT: u16 = 204;
pub const HTTP_BAD_PARAMETER: u16 = 400;
pub const HTTP_UNAUTHORIZED: u16 = 401;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;
pub const HTTP_METHOD_NOT_ALLOWED: u16 = 405;
pub const HTTP_CONFLICT: u16 = 409;
pub const HTTP_GONE: u16 = 410;
pub const HTTP_PRECONDITION_FAILED: u16 = 412;
pub const HTTP_SERVER_ERROR: u16 = 500;
pub const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

// General errors.
pub const NO_ERROR: i64 = 0;
pub const FAILED: i64 = 1;
pub const BAD_PARAMETER: i64 = 10;
pub const FORBIDDEN: i64 = 11;

// HTTP-level errors reported in the body.
pub const HTTP_ERROR_UNAUTHORIZED: i64 = 401;
pub const HTTP_ERROR_NOT_FOUND: i64 = 404;

// Storage errors.
pub const CONFLICT: i64 = 1200;
pub const DOCUMENT_NOT_FOUND: i64 = 1202;
pub const DATA_SOURCE_NOT_FOUND: i64 = 1203;
pub const DUPLICATE_NAME: i64 = 1207;
pub const ILLEGAL_NAME: i64 = 1208;
pub const UNIQUE_CONSTRAINT_VIOLATED: i64 = 1210;
pub const DATABASE_NOT_FOUND: i64 = 1228;

// Query errors.
pub const QUERY_KILLED: i64 = 1500;
pub const QUERY_PARSE: i64 = 1501;
pub const QUERY_NOT_FOUND: i64 = 1591;

// Cursor and transaction errors.
pub const CURSOR_NOT_FOUND: i64 = 1600;
pub const TRANSACTION_NOT_FOUND: i64 = 1655;
