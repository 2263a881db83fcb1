//! Prompt assembly for the financial-analyst model calls.
//!
//! Two templates, both in Spanish to match the source documents: a
//! single-document analysis prompt and a two-company comparison prompt.
//! Retrieved context is joined, cleaned length-wise with the head+tail
//! bound, and embedded between explicit tags the model is told to respect.

use crate::metadata::KbMetadata;
use crate::normalize::truncate_middle;

/// Budget for each context block inserted into a prompt.
pub const MAX_CONTEXT_CHARS: usize = 35_000;
/// Characters of the document head retained when the budget is exceeded.
pub const CONTEXT_HEAD_CHARS: usize = 20_000;

/// Joins retrieved fragments and bounds the result to the context budget.
fn context_block(fragments: &[String]) -> String {
    let joined = fragments.join("\n\n");
    truncate_middle(&joined, MAX_CONTEXT_CHARS, CONTEXT_HEAD_CHARS)
}

/// Prompt for answering a question from a single document's retrieved
/// context.
pub fn single_document_prompt(question: &str, fragments: &[String]) -> String {
    let contexto = context_block(fragments);

    format!(
        r#"<ROLE>
Eres un **analista financiero senior** y **especialista en políticas contables** con conocimiento profundo de estados financieros (balance, estado de resultados, flujo de caja, notas) y experiencia específica en **Grupo Sura** (estructura de negocios, prácticas contables típicas de sociedades holding y compañías de servicios financieros en Colombia). Tu trabajo: recibir extractos de estados financieros y políticas contables, analizarlos y **responder preguntas** basadas en esa información y en lo que ya se sabe de Grupo Sura.
</ROLE>

<INSTRUCCIONES>
1. **Respeta y conserva todas las etiquetas** del input (por ejemplo `<INPUT>`, `<TABLA>`, `<NOTAS>`, etc.). No las elimines ni las renombres.
2. Los fragmentos de `<INPUT>` fueron recuperados por similitud con la pregunta; pueden ser parciales. **Extrae y normaliza** la información (mapeo de cuentas, periodos, moneda) antes de responder.
3. Al responder: **indica claramente** (a) qué proviene de los datos entregados, (b) qué proviene de conocimiento general sobre Grupo Sura y (c) qué es una inferencia o suposición.
4. Si una pregunta requiere conocimiento externo no provisto, **comunícalo explícitamente** y ofrece alternativas (ej., pedir más datos o permitir usar conocimiento público).
5. Siempre muestra las **fórmulas** usadas en cálculos clave y las **líneas/etiquetas** exactas del input que usaste.
6. Idioma de salida: **español** (a menos que el usuario pida lo contrario).
</INSTRUCCIONES>

<INPUT>
{contexto}
</INPUT>

<PASOS_A_SEGUIR>
1. **Validación**: Verifica que los fragmentos sean pertinentes a la pregunta. Reporta valores faltantes.
2. **Cálculos clave** (si aplica): liquidez, endeudamiento, rentabilidad, cobertura de intereses, variaciones YoY.
3. **Análisis de políticas**: Identifica impactos por políticas (reconocimiento de ingresos, consolidación, valor razonable, provisiones).
4. **Respuesta a la pregunta**: entrega respuesta directa, referenciada a los fragmentos y con nivel de confianza (Alto/Medio/Bajo).
</PASOS_A_SEGUIR>

<OUTPUT>
Entrega primero una **respuesta directa y breve**, luego el **análisis de soporte** con referencias a los fragmentos, los **supuestos** y el **nivel de confianza** (Alto/Medio/Bajo). Cierra con una versión humana legible para presentaciones o correos.
</OUTPUT>

<PREGUNTA_DEL_USUARIO>
{question}
</PREGUNTA_DEL_USUARIO>

FIN DEL PROMPT."#
    )
}

/// Prompt comparing the Grupo Sura reference context against a second
/// company's context.
pub fn comparison_prompt(
    question: &str,
    reference_fragments: &[String],
    target_fragments: &[String],
    target: &KbMetadata,
) -> String {
    let contexto_sura = context_block(reference_fragments);
    let contexto_empresa = context_block(target_fragments);
    let empresa = &target.empresa;
    let pais = &target.pais;
    let anio = target.anio;

    format!(
        r#"<ROLE>
Eres un **analista financiero senior** y **especialista en políticas contables** con experiencia en **Grupo Sura** y en análisis comparativo de estados financieros de empresas latinoamericanas. Tu trabajo: comparar los extractos entregados de Grupo Sura con los de **{empresa}** ({pais}, {anio}) y **responder la pregunta del usuario** a partir de esa comparación.
</ROLE>

<INSTRUCCIONES>
1. **Respeta y conserva todas las etiquetas** del input. No las elimines ni las renombres.
2. Los fragmentos fueron recuperados por similitud con la pregunta; pueden ser parciales. No asumas que representan el documento completo.
3. Al responder: **indica claramente** (a) qué proviene de `<CONTEXTO_SURA>`, (b) qué proviene de `<CONTEXTO_EMPRESA>` y (c) qué es una inferencia o suposición.
4. Señala diferencias y similitudes en **políticas contables**, **ratios** y **prácticas de revelación**; cuando una cifra falte en un lado, dilo explícitamente.
5. Siempre muestra las **fórmulas** usadas en cálculos clave y las etiquetas exactas de los fragmentos que usaste.
6. Idioma de salida: **español** (a menos que el usuario pida lo contrario).
</INSTRUCCIONES>

<CONTEXTO_SURA>
{contexto_sura}
</CONTEXTO_SURA>

<CONTEXTO_EMPRESA empresa="{empresa}" pais="{pais}" anio="{anio}">
{contexto_empresa}
</CONTEXTO_EMPRESA>

<PASOS_A_SEGUIR>
1. **Validación**: Verifica que ambos contextos contengan información pertinente a la pregunta; reporta vacíos.
2. **Normalización**: Mapear cuentas y periodos a un plan común antes de comparar.
3. **Comparativa**: Contrasta políticas y cifras de {empresa} con las de Grupo Sura; señala si están alineadas con prácticas comunes de un holding financiero en la región.
4. **Respuesta a la pregunta**: entrega respuesta directa, referenciada a ambos contextos y con nivel de confianza (Alto/Medio/Bajo).
5. **Recomendaciones**: acciones de seguimiento y qué datos faltan.
</PASOS_A_SEGUIR>

<PREGUNTA_DEL_USUARIO>
{question}
</PREGUNTA_DEL_USUARIO>

FIN DEL PROMPT."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fragments(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn single_prompt_carries_question_and_context() {
        let prompt = single_document_prompt(
            "¿Qué se considera efectivo?",
            &fragments(&["Política de efectivo: depósitos a la vista."]),
        );
        assert!(prompt.contains("<PREGUNTA_DEL_USUARIO>\n¿Qué se considera efectivo?"));
        assert!(prompt.contains("Política de efectivo: depósitos a la vista."));
        assert!(prompt.starts_with("<ROLE>"));
        assert!(prompt.ends_with("FIN DEL PROMPT."));
    }

    #[test]
    fn comparison_prompt_tags_both_contexts() {
        let meta = KbMetadata::from_source(Path::new("ARGOS_COL_2023.pdf"), 2024);
        let prompt = comparison_prompt(
            "¿Cómo difieren las políticas de ingresos?",
            &fragments(&["Sura reconoce ingresos al devengo."]),
            &fragments(&["Argos reconoce ingresos por avance de obra."]),
            &meta,
        );
        assert!(prompt.contains("<CONTEXTO_SURA>"));
        assert!(prompt.contains(r#"<CONTEXTO_EMPRESA empresa="ARGOS" pais="Colombia" anio="2023">"#));
        assert!(prompt.contains("Sura reconoce ingresos al devengo."));
        assert!(prompt.contains("Argos reconoce ingresos por avance de obra."));
    }

    #[test]
    fn oversized_context_is_bounded() {
        let big = "x".repeat(2 * MAX_CONTEXT_CHARS);
        let prompt = single_document_prompt("¿?", &[big]);
        assert!(prompt.contains(crate::normalize::TRUNCATION_MARKER));
        assert!(prompt.len() < 2 * MAX_CONTEXT_CHARS);
    }
}
