pub mod records;
pub mod network_file;
pub mod trains_file;

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "{} file, line {}: error converting number", _0, _1)]
    NumberError(&'static str, usize),
    #[fail(display = "{} file, line {}: unrecognized line: {}", _0, _1, _2)]
    Unrecognized(&'static str, usize, String),
    #[fail(display = "{} file is missing its header lines", _0)]
    MissingHeader(&'static str),
}
