mod body_tests;
