// author: kodeholic (powered by Claude)
//
// 랑데부 코드 생성/정규화/검증
//
// 코드 형태: sss-sss-sss (9자 + 하이픈 2개)
// 알파벳: 혼동 문자(0/1/i/l/o)를 제외한 31개 심볼 — 약 44비트 엔트로피
//
// 검증은 형태만 본다: [a-z0-9] 3자 그룹 3개. 발급 알파벳보다 넓게 허용하므로
// 타이핑된 코드가 발급 불가능한 문자를 담고 있어도 조회는 그대로 실패로 흘러간다.

use rand::Rng;

/// 발급 알파벳 — a-z에서 i/l/o 제외(23자) + 2-9(8자) = 31자
pub const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// 랜덤 코드 생성 (sss-sss-sss)
/// - rand 크레이트 기반 CSPRNG 사용 (xorshift 대비 충돌 안전)
/// - 중복 여부는 호출측(레지스트리)이 재추첨으로 해소
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(11);
    for i in 0..9 {
        if i == 3 || i == 6 {
            out.push('-');
        }
        out.push(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char);
    }
    out
}

/// 입력 정규화: 소문자화 + 공백 런을 하이픈 하나로 + 양끝 하이픈/공백 제거
/// 문자 치환(0→o 등)은 하지 않는다 — 알파벳 밖 문자로 매핑되어 조회에 도움이 안 됨
pub fn normalize(input: &str) -> String {
    let lowered = input.trim().to_ascii_lowercase();
    let collapsed = lowered
        .split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    collapsed.trim_matches('-').to_string()
}

/// 형태 검증: normalize 후 xxx-xxx-xxx, 각 그룹은 [a-z0-9] 3자
pub fn validate(input: &str) -> bool {
    let code = normalize(input);
    let groups: Vec<&str> = code.split('-').collect();
    groups.len() == 3
        && groups.iter().all(|g| {
            g.len() == 3 && g.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}
