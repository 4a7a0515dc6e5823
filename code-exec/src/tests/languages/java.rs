use super::super::fixtures::code_samples::JAVA_HELLO;
use super::*;

#[tokio::test]
async fn test_java_basic() {
    test_language_execution("java", &["javac", "java"], JAVA_HELLO).await
}

#[tokio::test]
async fn test_java_exception() {
    let code = r#"
        public class Main {
            public static void main(String[] args) {
                throw new IllegalStateException("java sentinel");
            }
        }
    "#;
    if let Some(result) =
        run_if_available(&["javac", "java"], ExecutionRequest::new("java", code)).await
    {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.stderr.contains("java sentinel"));
    }
}
