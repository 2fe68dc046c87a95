//! End-to-end tests across the facade: key lifecycle roundtrips, format
//! widths, usage partitioning, wrap/unwrap composition, randomness quota and
//! persistent storage.

use tempfile::tempdir;
use webcrypto_kit::prelude::*;

fn subtle() -> SubtleCrypto {
    SubtleCrypto::new()
}

async fn generate_pair(alg: &Algorithm, usages: &[KeyUsage]) -> KeyPair {
    subtle()
        .generate_key(alg, true, usages)
        .await
        .expect("generate_key")
        .into_pair()
        .expect("key pair")
}

#[tokio::test]
async fn aes_jwk_roundtrip_preserves_parameters() {
    let subtle = subtle();
    let usages = [KeyUsage::Encrypt, KeyUsage::Decrypt];
    let key = subtle
        .generate_key(&Algorithm::new("AES-GCM").with_length(256), true, &usages)
        .await
        .unwrap()
        .into_single()
        .unwrap();

    let jwk = subtle
        .export_key(KeyFormat::Jwk, &key)
        .await
        .unwrap()
        .into_jwk()
        .unwrap();
    let imported = subtle
        .import_key(
            KeyFormat::Jwk,
            KeyData::Jwk(jwk),
            &Algorithm::new("AES-GCM"),
            true,
            &usages,
        )
        .await
        .unwrap();

    assert_eq!(imported.algorithm.length, key.algorithm.length);
    assert_eq!(imported.usages, key.usages);
    assert_eq!(imported.kind, KeyKind::Secret);

    // Same material: ciphertext from one decrypts under the other.
    let params = Algorithm::new("AES-GCM").with_iv(vec![1u8; 12]);
    let ciphertext = subtle.encrypt(&params, &key, b"roundtrip").await.unwrap();
    let plaintext = subtle.decrypt(&params, &imported, &ciphertext).await.unwrap();
    assert_eq!(plaintext, b"roundtrip");
}

#[tokio::test]
async fn hmac_jwk_roundtrip_preserves_parameters() {
    let subtle = subtle();
    let usages = [KeyUsage::Sign, KeyUsage::Verify];
    let alg = Algorithm::new("HMAC").with_hash("SHA-256");
    let key = subtle
        .generate_key(&alg, true, &usages)
        .await
        .unwrap()
        .into_single()
        .unwrap();
    let jwk = subtle
        .export_key(KeyFormat::Jwk, &key)
        .await
        .unwrap()
        .into_jwk()
        .unwrap();
    let imported = subtle
        .import_key(KeyFormat::Jwk, KeyData::Jwk(jwk), &alg, true, &usages)
        .await
        .unwrap();
    assert_eq!(imported.usages, key.usages);

    let tag = subtle.sign(&alg, &key, b"data").await.unwrap();
    assert!(subtle.verify(&alg, &imported, &tag, b"data").await.unwrap());
}

#[tokio::test]
async fn rsa_jwk_roundtrip_preserves_parameters() {
    let subtle = subtle();
    let alg = Algorithm::new("RSASSA-PKCS1-v1_5")
        .with_hash("SHA-256")
        .with_modulus_length(1024)
        .with_public_exponent(vec![1, 0, 1]);
    let pair = generate_pair(&alg, &[KeyUsage::Sign, KeyUsage::Verify]).await;

    let jwk = subtle
        .export_key(KeyFormat::Jwk, &pair.private)
        .await
        .unwrap()
        .into_jwk()
        .unwrap();
    assert_eq!(jwk.alg.as_deref(), Some("RS256"));

    let imported = subtle
        .import_key(
            KeyFormat::Jwk,
            KeyData::Jwk(jwk),
            &alg,
            true,
            &pair.private.usages,
        )
        .await
        .unwrap();
    assert_eq!(imported.kind, KeyKind::Private);
    assert_eq!(
        imported.algorithm.modulus_length,
        pair.private.algorithm.modulus_length
    );
    assert_eq!(
        imported.algorithm.public_exponent,
        pair.private.algorithm.public_exponent
    );
    assert_eq!(imported.usages, pair.private.usages);

    // The reimported private key signs; the original public key verifies.
    let signature = subtle
        .sign(&Algorithm::new("RSASSA-PKCS1-v1_5"), &imported, b"payload")
        .await
        .unwrap();
    assert!(subtle
        .verify(
            &Algorithm::new("RSASSA-PKCS1-v1_5"),
            &pair.public,
            &signature,
            b"payload"
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn ec_jwk_roundtrip_preserves_parameters() {
    let subtle = subtle();
    let alg = Algorithm::new("ECDSA").with_named_curve("P-384");
    let pair = generate_pair(&alg, &[KeyUsage::Sign, KeyUsage::Verify]).await;

    let jwk = subtle
        .export_key(KeyFormat::Jwk, &pair.public)
        .await
        .unwrap()
        .into_jwk()
        .unwrap();
    let imported = subtle
        .import_key(
            KeyFormat::Jwk,
            KeyData::Jwk(jwk),
            &alg,
            true,
            &pair.public.usages,
        )
        .await
        .unwrap();
    assert_eq!(imported.algorithm.named_curve, Some("P-384".to_string()));
    assert_eq!(imported.usages, pair.public.usages);

    let params = Algorithm::new("ECDSA").with_hash("SHA-384");
    let signature = subtle.sign(&params, &pair.private, b"payload").await.unwrap();
    assert!(subtle
        .verify(&params, &imported, &signature, b"payload")
        .await
        .unwrap());
}

#[tokio::test]
async fn ec_coordinates_are_fixed_width_per_curve() {
    let subtle = subtle();
    for (curve, width) in [("P-256", 32usize), ("P-384", 48), ("P-521", 66)] {
        let pair = generate_pair(
            &Algorithm::new("ECDSA").with_named_curve(curve),
            &[KeyUsage::Sign, KeyUsage::Verify],
        )
        .await;
        let jwk = subtle
            .export_key(KeyFormat::Jwk, &pair.public)
            .await
            .unwrap()
            .into_jwk()
            .unwrap();
        let x = webcrypto_kit::jwk::b64url_decode(jwk.x.as_deref().unwrap()).unwrap();
        let y = webcrypto_kit::jwk::b64url_decode(jwk.y.as_deref().unwrap()).unwrap();
        assert_eq!(x.len(), width, "{curve} x width");
        assert_eq!(y.len(), width, "{curve} y width");

        let raw = subtle
            .export_key(KeyFormat::Raw, &pair.public)
            .await
            .unwrap()
            .into_bytes()
            .unwrap();
        assert_eq!(raw.len(), 1 + 2 * width, "{curve} raw point width");
        assert_eq!(raw[0], 0x04);
    }
}

#[tokio::test]
async fn generate_partitions_usages_for_asymmetric_families() {
    let requested = [KeyUsage::Sign, KeyUsage::Verify, KeyUsage::Encrypt];

    let ec = generate_pair(
        &Algorithm::new("ECDSA").with_named_curve("P-256"),
        &requested,
    )
    .await;
    assert_eq!(ec.private.usages, vec![KeyUsage::Sign]);
    assert_eq!(ec.public.usages, vec![KeyUsage::Verify]);

    let rsa = generate_pair(
        &Algorithm::new("RSA-PSS")
            .with_hash("SHA-256")
            .with_modulus_length(1024)
            .with_public_exponent(vec![1, 0, 1]),
        &requested,
    )
    .await;
    assert!(rsa.private.usages.iter().all(|u| *u == KeyUsage::Sign));
    assert!(rsa
        .public
        .usages
        .iter()
        .all(|u| [KeyUsage::Verify, KeyUsage::Encrypt].contains(u)));
}

#[tokio::test]
async fn aes_import_ignores_the_declared_length() {
    let imported = subtle()
        .import_key(
            KeyFormat::Raw,
            KeyData::Bytes(vec![7u8; 16]),
            &Algorithm::new("AES-CBC").with_length(256),
            true,
            &[KeyUsage::Encrypt, KeyUsage::Decrypt],
        )
        .await
        .unwrap();
    assert_eq!(imported.algorithm.length, Some(128));
}

#[tokio::test]
async fn aes_kw_wrap_unwrap_restores_the_key() {
    let subtle = subtle();
    let kek = subtle
        .generate_key(
            &Algorithm::new("AES-KW").with_length(128),
            true,
            &[KeyUsage::WrapKey, KeyUsage::UnwrapKey],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();
    let payload_key = subtle
        .generate_key(
            &Algorithm::new("AES-GCM").with_length(256),
            true,
            &[KeyUsage::Encrypt, KeyUsage::Decrypt],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();

    let wrapped = subtle
        .wrap_key(KeyFormat::Raw, &payload_key, &kek, &Algorithm::new("AES-KW"))
        .await
        .unwrap();
    // RFC 3394 adds one 8-byte semiblock.
    assert_eq!(wrapped.len(), 32 + 8);

    let unwrapped = subtle
        .unwrap_key(
            KeyFormat::Raw,
            &wrapped,
            &kek,
            &Algorithm::new("AES-KW"),
            &payload_key.algorithm,
            true,
            &payload_key.usages,
        )
        .await
        .unwrap();

    let original = subtle
        .export_key(KeyFormat::Raw, &payload_key)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    let restored = subtle
        .export_key(KeyFormat::Raw, &unwrapped)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    assert_eq!(original, restored);
    assert_eq!(unwrapped.usages, payload_key.usages);
}

#[tokio::test]
async fn non_kw_wrapping_falls_through_to_generic_encrypt() {
    let subtle = subtle();
    // The generic path runs the public encrypt operation, so the wrapping key
    // carries both wrapKey and encrypt usages.
    let rsa = generate_pair(
        &Algorithm::new("RSA-OAEP")
            .with_hash("SHA-256")
            .with_modulus_length(1024)
            .with_public_exponent(vec![1, 0, 1]),
        &[
            KeyUsage::Encrypt,
            KeyUsage::Decrypt,
            KeyUsage::WrapKey,
            KeyUsage::UnwrapKey,
        ],
    )
    .await;
    let secret = subtle
        .generate_key(
            &Algorithm::new("AES-GCM").with_length(128),
            true,
            &[KeyUsage::Encrypt, KeyUsage::Decrypt],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();

    let wrapped = subtle
        .wrap_key(
            KeyFormat::Raw,
            &secret,
            &rsa.public,
            &Algorithm::new("RSA-OAEP"),
        )
        .await
        .unwrap();
    let unwrapped = subtle
        .unwrap_key(
            KeyFormat::Raw,
            &wrapped,
            &rsa.private,
            &Algorithm::new("RSA-OAEP"),
            &secret.algorithm,
            true,
            &secret.usages,
        )
        .await
        .unwrap();

    let original = subtle
        .export_key(KeyFormat::Raw, &secret)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    let restored = subtle
        .export_key(KeyFormat::Raw, &unwrapped)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    assert_eq!(original, restored);
}

#[tokio::test]
async fn jwk_format_wrapping_serializes_the_record() {
    let subtle = subtle();
    let kek = subtle
        .generate_key(
            &Algorithm::new("AES-GCM").with_length(256),
            true,
            &[
                KeyUsage::Encrypt,
                KeyUsage::Decrypt,
                KeyUsage::WrapKey,
                KeyUsage::UnwrapKey,
            ],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();
    let secret = subtle
        .generate_key(
            &Algorithm::new("AES-CBC").with_length(128),
            true,
            &[KeyUsage::Encrypt, KeyUsage::Decrypt],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();

    let wrap_params = Algorithm::new("AES-GCM").with_iv(vec![3u8; 12]);
    let wrapped = subtle
        .wrap_key(KeyFormat::Jwk, &secret, &kek, &wrap_params)
        .await
        .unwrap();
    let unwrapped = subtle
        .unwrap_key(
            KeyFormat::Jwk,
            &wrapped,
            &kek,
            &wrap_params,
            &secret.algorithm,
            true,
            &secret.usages,
        )
        .await
        .unwrap();
    assert_eq!(unwrapped.algorithm.length, Some(128));
}

#[test]
fn random_values_respect_the_entropy_quota() {
    let crypto = WebCrypto::new();

    let mut oversized = vec![0u8; 65537];
    let err = crypto.get_random_values(&mut oversized).unwrap_err();
    assert_eq!(err.code(), Some(22));

    let mut first = vec![0u8; 65536];
    let mut second = vec![0u8; 65536];
    crypto.get_random_values(&mut first).unwrap();
    crypto.get_random_values(&mut second).unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn unknown_sign_algorithm_is_rejected_by_name() {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &Algorithm::new("HMAC").with_hash("SHA-256"),
            true,
            &[KeyUsage::Sign, KeyUsage::Verify],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();
    let err = subtle
        .sign(&Algorithm::new("FOO"), &key, b"data")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(name) if name == "FOO"));
}

#[tokio::test]
async fn non_extractable_keys_never_export() {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &Algorithm::new("AES-GCM").with_length(128),
            false,
            &[KeyUsage::Encrypt],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();
    for format in [KeyFormat::Raw, KeyFormat::Jwk] {
        let err = subtle.export_key(format, &key).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{format}");
    }
}

#[tokio::test]
async fn ecdh_derives_matching_bits_on_both_sides() {
    let subtle = subtle();
    let usages = [KeyUsage::DeriveKey, KeyUsage::DeriveBits];
    let ecdh = Algorithm::new("ECDH").with_named_curve("P-256");
    let alice = generate_pair(&ecdh, &usages).await;
    let bob = generate_pair(&ecdh, &usages).await;

    let ab = subtle
        .derive_bits(
            &Algorithm::new("ECDH").with_public(bob.public.clone()),
            &alice.private,
            128,
        )
        .await
        .unwrap();
    let ba = subtle
        .derive_bits(
            &Algorithm::new("ECDH").with_public(alice.public.clone()),
            &bob.private,
            128,
        )
        .await
        .unwrap();
    assert_eq!(ab, ba);
    assert_eq!(ab.len(), 16);
}

#[tokio::test]
async fn pbkdf2_key_drives_aes_end_to_end() {
    let subtle = subtle();
    let password = subtle
        .import_key(
            KeyFormat::Raw,
            KeyData::Bytes(b"correct horse battery staple".to_vec()),
            &Algorithm::new("PBKDF2"),
            false,
            &[KeyUsage::DeriveKey, KeyUsage::DeriveBits],
        )
        .await
        .unwrap();
    assert_eq!(password.algorithm.name, "PBKDF2");

    let derive_params = Algorithm::new("PBKDF2")
        .with_hash("SHA-256")
        .with_salt(b"pepper".to_vec())
        .with_iterations(1000);
    let aes = subtle
        .derive_key(
            &derive_params,
            &password,
            &Algorithm::new("AES-GCM").with_length(256),
            true,
            &[KeyUsage::Encrypt, KeyUsage::Decrypt],
        )
        .await
        .unwrap();

    let params = Algorithm::new("AES-GCM").with_iv(vec![9u8; 12]);
    let ciphertext = subtle.encrypt(&params, &aes, b"sealed").await.unwrap();
    assert_eq!(subtle.decrypt(&params, &aes, &ciphertext).await.unwrap(), b"sealed");

    // Deriving again with the same parameters yields the same key material.
    let again = subtle
        .derive_key(
            &derive_params,
            &password,
            &Algorithm::new("AES-GCM").with_length(256),
            true,
            &[KeyUsage::Decrypt],
        )
        .await
        .unwrap();
    assert_eq!(subtle.decrypt(&params, &again, &ciphertext).await.unwrap(), b"sealed");
}

#[tokio::test]
async fn storage_roundtrips_across_instances() {
    let dir = tempdir().unwrap();
    let subtle = subtle();
    let pair = generate_pair(
        &Algorithm::new("ECDSA").with_named_curve("P-256"),
        &[KeyUsage::Sign, KeyUsage::Verify],
    )
    .await;

    {
        let storage = KeyStorage::new(dir.path()).unwrap();
        storage.set_item("k1", &pair.private).unwrap();
    }

    let storage = KeyStorage::new(dir.path()).unwrap();
    let restored = storage.get_item("k1").unwrap().unwrap();
    assert_eq!(restored.kind, pair.private.kind);
    assert_eq!(restored.usages, pair.private.usages);
    assert_eq!(
        restored.algorithm.named_curve,
        pair.private.algorithm.named_curve
    );

    // And the restored handle still signs for the original public key.
    let params = Algorithm::new("ECDSA").with_hash("SHA-256");
    let signature = subtle.sign(&params, &restored, b"persisted").await.unwrap();
    assert!(subtle
        .verify(&params, &pair.public, &signature, b"persisted")
        .await
        .unwrap());
}

#[tokio::test]
async fn missing_usage_fails_before_dispatch() {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &Algorithm::new("AES-GCM").with_length(128),
            true,
            &[KeyUsage::Encrypt],
        )
        .await
        .unwrap()
        .into_single()
        .unwrap();
    let params = Algorithm::new("AES-GCM").with_iv(vec![0u8; 12]);
    let err = subtle.decrypt(&params, &key, b"irrelevant").await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn spki_and_pkcs8_passthrough_roundtrip() {
    let subtle = subtle();
    let alg = Algorithm::new("ECDSA").with_named_curve("P-256");
    let pair = generate_pair(&alg, &[KeyUsage::Sign, KeyUsage::Verify]).await;

    let spki = subtle
        .export_key(KeyFormat::Spki, &pair.public)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    let public = subtle
        .import_key(
            KeyFormat::Spki,
            KeyData::Bytes(spki),
            &alg,
            true,
            &[KeyUsage::Verify],
        )
        .await
        .unwrap();
    assert_eq!(public.kind, KeyKind::Public);
    assert_eq!(public.algorithm.named_curve, Some("P-256".to_string()));

    let pkcs8 = subtle
        .export_key(KeyFormat::Pkcs8, &pair.private)
        .await
        .unwrap()
        .into_bytes()
        .unwrap();
    let private = subtle
        .import_key(
            KeyFormat::Pkcs8,
            KeyData::Bytes(pkcs8),
            &alg,
            true,
            &[KeyUsage::Sign],
        )
        .await
        .unwrap();
    assert_eq!(private.kind, KeyKind::Private);

    let params = Algorithm::new("ECDSA").with_hash("SHA-256");
    let signature = subtle.sign(&params, &private, b"der").await.unwrap();
    assert!(subtle.verify(&params, &public, &signature, b"der").await.unwrap());
}
