#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use kali::error::KaliError;
use kali::session::{Session, SessionOptions};

/// A `Write` sink whose contents stay readable after it has been handed to
/// an interpreter.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn session(type_check: bool) -> (Session, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let session = Session::with_output(SessionOptions { type_check }, Box::new(buffer.clone()));
    (session, buffer)
}

/// Run `source` in a fresh checked session.
pub fn run(source: &str) -> (String, Result<(), Vec<KaliError>>) {
    let (mut session, buffer) = session(true);
    let result = session.run(source);
    (buffer.contents(), result)
}

/// Run `source` in a fresh session without the type checker.
pub fn run_unchecked(source: &str) -> (String, Result<(), Vec<KaliError>>) {
    let (mut session, buffer) = session(false);
    let result = session.run(source);
    (buffer.contents(), result)
}

/// Output of a program that must succeed.
pub fn output_of(source: &str) -> String {
    let (output, result) = run(source);
    if let Err(errors) = result {
        panic!("program failed: {:?}", errors);
    }
    output
}

pub fn unchecked_output_of(source: &str) -> String {
    let (output, result) = run_unchecked(source);
    if let Err(errors) = result {
        panic!("program failed: {:?}", errors);
    }
    output
}

/// The single error a failing program produced.
pub fn single_error(result: Result<(), Vec<KaliError>>) -> KaliError {
    let mut errors = result.expect_err("program should have failed");
    assert_eq!(errors.len(), 1, "expected one error, got {:?}", errors);
    errors.remove(0)
}
