//! Loading policy documents with every rule type

mod common;

use std::sync::Arc;

use common::*;
use tokengate_authz::{AuthzError, Logic, PolicySet, RuleKind};
use tokengate_chain::testing::MockProvider;

#[test]
fn test_load_mixed_document() {
    let factory = factory(Arc::new(MockProvider::new()));
    let json = format!(
        r#"{{"policies": [
            {{"path": "/api/vip", "method": "GET", "logic": "AND", "rules": [
                {{"type": "has_scope", "params": {{"scope": "admin"}}}},
                {{"type": "erc20_min_balance", "params": {{"token": "{USDC}", "chainId": 1, "minimum": "1000000000"}}}}
            ]}},
            {{"path": "/club/*", "method": "*", "logic": "OR", "rules": [
                {{"type": "erc721_owner", "params": {{"token": "{BAYC}", "tokenId": "1234"}}}},
                {{"type": "erc721_owner", "params": {{"token": "{BAYC}", "anyToken": true}}}},
                {{"type": "in_allowlist", "params": {{"allowlistId": "founders"}}}}
            ]}}
        ]}}"#
    );

    let set = PolicySet::from_json(&json, &factory).unwrap();
    assert_eq!(set.len(), 2);

    let club = set.matching("/club/lounge", "PATCH").next().unwrap();
    assert_eq!(club.logic(), Logic::Or);
    let kinds: Vec<RuleKind> = club.rules().iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![RuleKind::Erc721Owner, RuleKind::Erc721Owner, RuleKind::InAllowlist]
    );
    assert!(club.rules()[0].descriptor().summary.contains("tokenId=1234"));
}

#[test]
fn test_load_rejects_invalid_rules() {
    let factory = factory(Arc::new(MockProvider::new().with_chain_id(1)));
    let cases = [
        // empty rule list
        r#"[{"path":"/a","method":"GET","logic":"AND","rules":[]}]"#.to_string(),
        // tokenId and anyToken together
        format!(
            r#"[{{"path":"/a","method":"GET","logic":"AND","rules":[{{"type":"erc721_owner","params":{{"token":"{BAYC}","tokenId":"1","anyToken":true}}}}]}}]"#
        ),
        // token ID wider than 256 bits
        format!(
            r#"[{{"path":"/a","method":"GET","logic":"AND","rules":[{{"type":"erc721_owner","params":{{"token":"{BAYC}","tokenId":"{}"}}}}]}}]"#,
            "9".repeat(80)
        ),
        // checksummed address with a bad character
        r#"[{"path":"/a","method":"GET","logic":"AND","rules":[{"type":"erc20_min_balance","params":{"token":"0xZZb86991c6218b36c1d19d4a2e9eB0cE3606eB48","minimum":"1"}}]}]"#.to_string(),
        // chain the provider does not serve
        format!(
            r#"[{{"path":"/a","method":"GET","logic":"AND","rules":[{{"type":"erc20_min_balance","params":{{"token":"{USDC}","chainId":137,"minimum":"1"}}}}]}}]"#
        ),
        // unknown rule type
        r#"[{"path":"/a","method":"GET","logic":"AND","rules":[{"type":"eth_balance","params":{}}]}]"#.to_string(),
        // wildcard in the middle
        r#"[{"path":"/a/*/b","method":"GET","logic":"AND","rules":[{"type":"has_scope","params":{"scope":"x"}}]}]"#.to_string(),
    ];

    for json in cases {
        let result = PolicySet::from_json(&json, &factory);
        assert!(
            matches!(result, Err(AuthzError::InvalidPolicy(_))),
            "accepted invalid document: {json}"
        );
    }
}
