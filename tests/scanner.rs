#[cfg(test)]
mod scanner_tests {
    use kali::error::{KaliError, Phase};
    use kali::scanner::*;
    use kali::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_increments_and_annotations() {
        assert_token_sequence(
            "var x: number = 1; x++; --x;",
            &[
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::COLON, ":"),
                (TokenType::TYPE_NUMBER, "number"),
                (TokenType::EQUAL, "="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::PLUS_PLUS, "++"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::MINUS_MINUS, "--"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_type_keywords() {
        assert_token_sequence(
            "string boolean void Point",
            &[
                (TokenType::TYPE_STRING, "string"),
                (TokenType::TYPE_BOOLEAN, "boolean"),
                (TokenType::TYPE_VOID, "void"),
                (TokenType::IDENTIFIER, "Point"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_token_sequence(
            "1 // two three\n/ 4",
            &[
                (TokenType::NUMBER(0.0), "1"),
                (TokenType::SLASH, "/"),
                (TokenType::NUMBER(0.0), "4"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_multiline_string_advances_line() {
        let tokens: Vec<Token> = Scanner::new("\"a\nb\" x")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].token_type, TokenType::STRING(String::new()));
        assert_eq!(tokens[0].lexeme, "\"a\nb\"");
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = Scanner::new("\"abc").scan_all();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 1] Error: Unterminated string.");
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        let results: Vec<_> = scanner.collect();

        // COMMA, DOT, error '$', LEFT_PAREN, error '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<&KaliError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(errors.len(), 2, "Expected 2 error messages");

        for err in errors {
            assert_eq!(err.phase(), Phase::Syntax);
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        fn assert_token_matches(
            result: &Result<Token, KaliError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_non_ascii_character_is_one_error() {
        let (tokens, errors) = Scanner::new("é 1").scan_all();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unexpected character: é"));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_token_display_and_json() {
        let tokens: Vec<Token> = Scanner::new("42 \"hi\"").filter_map(Result::ok).collect();

        assert_eq!(tokens[0].to_string(), "NUMBER 42 42.0");
        assert_eq!(tokens[1].to_string(), "STRING \"hi\" hi");

        let json = serde_json::to_string(&tokens[0]).unwrap();
        assert!(json.contains("\"lexeme\":\"42\""), "got {}", json);
        assert!(json.contains("\"line\":1"), "got {}", json);
    }
}
